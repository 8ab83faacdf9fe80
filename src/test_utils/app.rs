// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::context::Context;

/// Container for a fully initialised service context on top of a fresh test
/// database.
pub struct TestApp {
    pub context: Context,
}
