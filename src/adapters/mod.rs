/*
Copyright 2024 San Francisco Compute Company

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! Adapters: implementations of the secondary ports

pub mod secondary {
    pub mod command {
        #[cfg(test)]
        pub mod scripted;
        pub mod unix;

        #[cfg(test)]
        pub use scripted::*;
        pub use unix::*;
    }

    pub mod config {
        pub mod toml_file;

        pub use toml_file::*;
    }

    pub mod topology {
        pub mod bosh;
        pub mod bosh_cli;
        pub mod ops_manager;

        pub use bosh::*;
        pub use bosh_cli::BoshCli;
        pub use ops_manager::*;
    }

    pub use command::*;
    pub use config::*;
    pub use topology::*;
}

pub use secondary::*;
