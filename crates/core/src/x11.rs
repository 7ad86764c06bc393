// SPDX-License-Identifier: MIT

//! X11 forwarding record (SPEC_FULL.md §13, supplementing spec.md's
//! `X11_DISPLAY` opcode, which specifies the wire shape but not where the
//! `(display, xauthority_path)` pair comes from).

use std::path::PathBuf;

/// Populated by the (out-of-scope) launcher when it sets up X11
/// forwarding for a step; read back verbatim by the `X11_DISPLAY` handler.
#[derive(Debug, Clone)]
pub struct X11Forward {
    pub display: u16,
    pub xauthority_path: PathBuf,
}
