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

//! Filesystem-safe encoding of object names.
//!
//! Digits, lower-case ASCII letters, `_`, ` ` and `-` are kept as is and
//! upper-case ASCII letters are folded, so two names that only differ in
//! ASCII case share one encoded form. Every other byte becomes `@xx`.

const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";

/// Appended to encoded names that a filesystem would treat as a device.
const RESERVED_SUFFIX: &str = "@@@";

const RESERVED_NAMES: [&str; 22] = [
    "con", "prn", "aux", "nul", "com1", "com2", "com3", "com4", "com5", "com6", "com7", "com8",
    "com9", "lpt1", "lpt2", "lpt3", "lpt4", "lpt5", "lpt6", "lpt7", "lpt8", "lpt9",
];

fn is_reserved(encoded: &str) -> bool {
    RESERVED_NAMES.contains(&encoded)
}

/// Encodes `name` into a form usable as a single path component.
pub fn encode_name(name: &str) -> String {
    let mut encoded = String::with_capacity(name.len());
    for byte in name.bytes() {
        match byte {
            b'0'..=b'9' | b'a'..=b'z' | b'_' | b' ' | b'-' => encoded.push(byte as char),
            b'A'..=b'Z' => encoded.push(byte.to_ascii_lowercase() as char),
            _ => {
                encoded.push('@');
                encoded.push(HEX_CHARS[(byte >> 4) as usize] as char);
                encoded.push(HEX_CHARS[(byte & 15) as usize] as char);
            }
        }
    }

    if is_reserved(&encoded) {
        encoded.push_str(RESERVED_SUFFIX);
    }
    encoded
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        _ => None,
    }
}

/// Reverses [encode_name]. Case folding is not reversible, so the result is
/// the lower-cased name. Returns `None` if `encoded` is not a valid encoding.
pub fn decode_name(encoded: &str) -> Option<String> {
    let encoded = encoded.strip_suffix(RESERVED_SUFFIX).unwrap_or(encoded);
    let bytes = encoded.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());

    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'@' {
            let high = hex_value(*bytes.get(i + 1)?)?;
            let low = hex_value(*bytes.get(i + 2)?)?;
            decoded.push((high << 4) | low);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }

    String::from_utf8(decoded).ok()
}
