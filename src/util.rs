// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use std::path::Path;
use std::time::Duration;

/// Extracts a displayable file name from a path-like sample reference, returning a
/// fallback if the name is unreadable.
pub fn filename_display(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or("unreadable file name")
}

/// Outputs the given duration in a minutes:seconds.millis format.
pub fn duration_minutes_seconds(duration: Duration) -> String {
    let minutes = duration.as_secs() / 60;
    let secs = duration.as_secs() - minutes * 60;
    format!("{}:{:02}.{:03}", minutes, secs, duration.subsec_millis())
}

/// Replaces every run of whitespace with a single underscore.
pub fn underscore_whitespace(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut in_whitespace = false;
    for c in name.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                result.push('_');
            }
            in_whitespace = true;
        } else {
            result.push(c);
            in_whitespace = false;
        }
    }
    result
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use crate::util::{duration_minutes_seconds, filename_display, underscore_whitespace};

    #[test]
    fn test_duration_minutes_strings() {
        assert_eq!("0:00.000", duration_minutes_seconds(Duration::new(0, 0)));
        assert_eq!("0:05.250", duration_minutes_seconds(Duration::from_millis(5250)));
        assert_eq!("1:00.000", duration_minutes_seconds(Duration::new(60, 0)));
        assert_eq!("60:06.000", duration_minutes_seconds(Duration::new(3606, 0)));
    }

    #[test]
    fn test_filename_display() {
        assert_eq!("Kick_808.wav", filename_display("drums/Kick_808.wav"));
        assert_eq!("Snare.wav", filename_display("Snare.wav"));
        assert_eq!("unreadable file name", filename_display(""));
    }

    #[test]
    fn test_underscore_whitespace() {
        assert_eq!("MPC_Hardware_Default", underscore_whitespace("MPC Hardware Default"));
        assert_eq!("_a_b_", underscore_whitespace(" a \t\n b "));
        assert_eq!("plain", underscore_whitespace("plain"));
    }
}
