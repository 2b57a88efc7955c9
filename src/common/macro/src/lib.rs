// Copyright 2023 Greptime Team
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

mod stack_trace_debug;

use proc_macro::TokenStream;

/// Attribute macro to derive [std::fmt::Debug] and `common_error::ext::StackError`
/// for a snafu error enum.
///
/// Variants are inspected by field name:
/// - `location` is printed next to the variant message,
/// - `source` is an internal error that implements `StackError` and is followed,
/// - `error` is an external error that is printed as the last layer.
#[proc_macro_attribute]
pub fn stack_trace_debug(args: TokenStream, input: TokenStream) -> TokenStream {
    stack_trace_debug::stack_trace_style_impl(args.into(), input.into()).into()
}
