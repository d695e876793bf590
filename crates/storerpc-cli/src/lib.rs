// Copyright 2025 storerpc Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # storerpc CLI
//!
//! Command-line interface for storerpc.
//!
//! - **serve**: runs a small demo router behind the HTTP adapter
//! - **call**: invokes one procedure through the store client and prints
//!   every state the store goes through as a JSON line
//!
//! ## Architecture
//!
//! The binary parses flags with `argh` and dispatches to [`demo`] (for
//! `serve`) or [`call`] (for `call`). Both modules live in the library so the
//! integration tests can drive them without spawning the binary.

pub mod call;
pub mod demo;
