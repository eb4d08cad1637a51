//! `bar update` — version reporting. Actual self-update plumbing (binary
//! replacement, release-channel polling) is out of scope; see
//! SPEC_FULL.md's Non-goals.

use crate::styling::{hint_message, info_message, println};

pub fn handle_update(check: bool) -> anyhow::Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    if check {
        println!("{}", info_message(format!("current version: {version}")));
        println!("{}", hint_message("automatic update checks are not implemented"));
    } else {
        println!("{}", info_message(format!("bar {version}")));
    }
    Ok(())
}
