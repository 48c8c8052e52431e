// icinga2ctl - CLI for the Icinga 2 HTTP API
// Copyright (C) 2024 The icinga2ctl authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Filter expressions for the Icinga 2 API.
//!
//! Names are rendered as DSL string literals, so backslashes and double
//! quotes inside a name are escaped rather than ending the literal early.

pub fn host(name: &str) -> String {
    format!("host.name == {}", quote(name))
}

pub fn service(host: &str, service: &str) -> String {
    format!(
        "host.name == {} && service.name == {}",
        quote(host),
        quote(service)
    )
}

pub fn hostgroup(group: &str) -> String {
    format!("{} in host.groups", quote(group))
}

pub fn servicegroup(group: &str) -> String {
    format!("{} in service.groups", quote(group))
}

fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        if matches!(ch, '"' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_each_target_kind() {
        assert_eq!(host("x"), r#"host.name == "x""#);
        assert_eq!(
            service("h", "s"),
            r#"host.name == "h" && service.name == "s""#
        );
        assert_eq!(hostgroup("g"), r#""g" in host.groups"#);
        assert_eq!(servicegroup("g"), r#""g" in service.groups"#);
    }

    #[test]
    fn escapes_quotes_and_backslashes() {
        assert_eq!(
            host(r#"evil" || true || ""#),
            r#"host.name == "evil\" || true || \"""#
        );
        assert_eq!(hostgroup(r"a\b"), r#""a\\b" in host.groups"#);
    }

    #[test]
    fn keeps_non_ascii_names_intact() {
        assert_eq!(host("münchen-01"), r#"host.name == "münchen-01""#);
    }
}
