use std::io::{self, IsTerminal};

use mediaforge::color::ColorMode;

use crate::RequestedColorMode;

pub(crate) mod generate;
pub(crate) mod list;

/// Returns whether ANSI color should be used
/// If the user has specified a preference, this is honored. This preference
/// can be specified through the command line or the "NO_COLOR" environment
/// variable. If the user hasn't stated a preference, color is enabled if
/// stdout is a terminal.
pub(crate) fn resolve_color_mode(cm: RequestedColorMode) -> ColorMode {
    match cm {
        RequestedColorMode::Auto => {
            let disable_color =
                std::env::var_os("NO_COLOR").is_some() || !io::stdout().is_terminal();

            if disable_color {
                ColorMode::Off
            } else {
                ColorMode::On
            }
        }
        RequestedColorMode::On => ColorMode::On,
        RequestedColorMode::Off => ColorMode::Off,
    }
}
