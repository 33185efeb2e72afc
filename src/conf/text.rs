// INI-style tunnel configuration text, the format users paste into the editor.

use super::{Interface, Peer, TunnelConfig};
use crate::control::types::TunnelName;
use itertools::Itertools;
use std::fmt::Write;
use std::net::IpAddr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Line {line}: expected a section header before `{text}`")]
    OutsideSection { line: usize, text: String },

    #[error("Line {line}: unknown section [{section}]")]
    UnknownSection { line: usize, section: String },

    #[error("Line {line}: expected `Key = Value`")]
    MissingEquals { line: usize },

    #[error("Line {line}: unknown key `{key}` in [{section}]")]
    UnknownKey {
        line: usize,
        section: &'static str,
        key: String,
    },

    #[error("Line {line}: invalid {key}: {reason}")]
    InvalidValue {
        line: usize,
        key: &'static str,
        reason: String,
    },

    #[error("Line {line}: {key} is set more than once")]
    DuplicateKey { line: usize, key: &'static str },

    #[error("Line {line}: only one [Interface] section is allowed")]
    DuplicateInterface { line: usize },

    #[error("Missing [Interface] section")]
    MissingInterface,

    #[error("[Interface] is missing PrivateKey")]
    MissingPrivateKey,

    #[error("[Peer] starting at line {line} is missing PublicKey")]
    MissingPublicKey { line: usize },
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Interface,
    Peer,
}

impl Section {
    fn name(self) -> &'static str {
        match self {
            Section::Interface => "Interface",
            Section::Peer => "Peer",
        }
    }
}

struct PeerDraft {
    line: usize,
    peer: Peer,
    public_key_set: bool,
}

/// Strips a trailing `#` comment and surrounding whitespace.
fn strip_comment(raw: &str) -> &str {
    match raw.find('#') {
        Some(index) => raw[..index].trim(),
        None => raw.trim(),
    }
}

fn split_key_value(line: usize, text: &str) -> Result<(&str, &str), ParseError> {
    let (key, value) = text
        .split_once('=')
        .ok_or(ParseError::MissingEquals { line })?;
    Ok((key.trim(), value.trim()))
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|item| !item.is_empty())
}

fn invalid(line: usize, key: &'static str, reason: impl Into<String>) -> ParseError {
    ParseError::InvalidValue {
        line,
        key,
        reason: reason.into(),
    }
}

fn parse_key(line: usize, key: &'static str, value: &str) -> Result<String, ParseError> {
    let well_formed = value.len() == 44
        && value.ends_with('=')
        && value[..43]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/');
    if !well_formed {
        return Err(invalid(line, key, "keys must be 32 bytes of base64"));
    }
    Ok(value.to_string())
}

fn parse_u16(line: usize, key: &'static str, value: &str) -> Result<u16, ParseError> {
    value
        .parse::<u16>()
        .map_err(|e| invalid(line, key, format!("`{}` is not a valid number ({})", value, e)))
}

fn parse_cidr(line: usize, key: &'static str, value: &str) -> Result<String, ParseError> {
    let (address, prefix) = match value.split_once('/') {
        Some((address, prefix)) => (address, Some(prefix)),
        None => (value, None),
    };
    let ip: IpAddr = address
        .parse()
        .map_err(|_| invalid(line, key, format!("`{}` is not an IP address", address)))?;
    if let Some(prefix) = prefix {
        let max = if ip.is_ipv4() { 32 } else { 128 };
        match prefix.parse::<u8>() {
            Ok(bits) if bits <= max => {}
            _ => {
                return Err(invalid(
                    line,
                    key,
                    format!("`{}` is not a valid prefix length", prefix),
                ));
            }
        }
    }
    Ok(value.to_string())
}

fn parse_endpoint(line: usize, value: &str) -> Result<String, ParseError> {
    let (host, port) = value
        .rsplit_once(':')
        .ok_or_else(|| invalid(line, "Endpoint", "expected host:port"))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() || host.contains(char::is_whitespace) {
        return Err(invalid(line, "Endpoint", format!("`{}` is not a host", host)));
    }
    parse_u16(line, "Endpoint", port)?;
    Ok(value.to_string())
}

fn set_once<T>(
    slot: &mut Option<T>,
    value: T,
    line: usize,
    key: &'static str,
) -> Result<(), ParseError> {
    if slot.is_some() {
        return Err(ParseError::DuplicateKey { line, key });
    }
    *slot = Some(value);
    Ok(())
}

fn apply_interface_key(
    interface: &mut Interface,
    private_key: &mut Option<String>,
    line: usize,
    key: &str,
    value: &str,
) -> Result<(), ParseError> {
    match key.to_ascii_lowercase().as_str() {
        "privatekey" => set_once(
            private_key,
            parse_key(line, "PrivateKey", value)?,
            line,
            "PrivateKey",
        ),
        "address" => {
            for item in split_list(value) {
                interface.addresses.push(parse_cidr(line, "Address", item)?);
            }
            Ok(())
        }
        "listenport" => set_once(
            &mut interface.listen_port,
            parse_u16(line, "ListenPort", value)?,
            line,
            "ListenPort",
        ),
        "mtu" => set_once(
            &mut interface.mtu,
            parse_u16(line, "MTU", value)?,
            line,
            "MTU",
        ),
        "dns" => {
            for item in split_list(value) {
                if item.contains(char::is_whitespace) {
                    return Err(invalid(line, "DNS", format!("`{}` is not a server", item)));
                }
                interface.dns.push(item.to_string());
            }
            Ok(())
        }
        _ => Err(ParseError::UnknownKey {
            line,
            section: Section::Interface.name(),
            key: key.to_string(),
        }),
    }
}

fn apply_peer_key(draft: &mut PeerDraft, line: usize, key: &str, value: &str) -> Result<(), ParseError> {
    let peer = &mut draft.peer;
    match key.to_ascii_lowercase().as_str() {
        "publickey" => {
            if draft.public_key_set {
                return Err(ParseError::DuplicateKey {
                    line,
                    key: "PublicKey",
                });
            }
            peer.public_key = parse_key(line, "PublicKey", value)?;
            draft.public_key_set = true;
            Ok(())
        }
        "presharedkey" => set_once(
            &mut peer.preshared_key,
            parse_key(line, "PresharedKey", value)?,
            line,
            "PresharedKey",
        ),
        "allowedips" => {
            for item in split_list(value) {
                peer.allowed_ips.push(parse_cidr(line, "AllowedIPs", item)?);
            }
            Ok(())
        }
        "endpoint" => set_once(
            &mut peer.endpoint,
            parse_endpoint(line, value)?,
            line,
            "Endpoint",
        ),
        "persistentkeepalive" => {
            if value.eq_ignore_ascii_case("off") {
                return Ok(());
            }
            set_once(
                &mut peer.persistent_keepalive,
                parse_u16(line, "PersistentKeepalive", value)?,
                line,
                "PersistentKeepalive",
            )
        }
        _ => Err(ParseError::UnknownKey {
            line,
            section: Section::Peer.name(),
            key: key.to_string(),
        }),
    }
}

fn finish_peer(draft: PeerDraft, peers: &mut Vec<Peer>) -> Result<(), ParseError> {
    if !draft.public_key_set {
        return Err(ParseError::MissingPublicKey { line: draft.line });
    }
    peers.push(draft.peer);
    Ok(())
}

/// Parses configuration text into a config bound to `name`.
pub fn parse(text: &str, name: &TunnelName) -> Result<TunnelConfig, ParseError> {
    let mut section: Option<Section> = None;
    let mut interface: Option<Interface> = None;
    let mut private_key: Option<String> = None;
    let mut peers = Vec::new();
    let mut current_peer: Option<PeerDraft> = None;

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let content = strip_comment(raw);
        if content.is_empty() {
            continue;
        }

        if let Some(header) = content
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
        {
            if let Some(draft) = current_peer.take() {
                finish_peer(draft, &mut peers)?;
            }
            match header.trim().to_ascii_lowercase().as_str() {
                "interface" => {
                    if interface.is_some() {
                        return Err(ParseError::DuplicateInterface { line });
                    }
                    interface = Some(Interface::default());
                    section = Some(Section::Interface);
                }
                "peer" => {
                    current_peer = Some(PeerDraft {
                        line,
                        peer: Peer::default(),
                        public_key_set: false,
                    });
                    section = Some(Section::Peer);
                }
                _ => {
                    return Err(ParseError::UnknownSection {
                        line,
                        section: header.trim().to_string(),
                    });
                }
            }
            continue;
        }

        let (key, value) = split_key_value(line, content)?;
        match section {
            None => {
                return Err(ParseError::OutsideSection {
                    line,
                    text: content.to_string(),
                });
            }
            Some(Section::Interface) => {
                if let Some(interface) = interface.as_mut() {
                    apply_interface_key(interface, &mut private_key, line, key, value)?;
                }
            }
            Some(Section::Peer) => {
                if let Some(draft) = current_peer.as_mut() {
                    apply_peer_key(draft, line, key, value)?;
                }
            }
        }
    }

    if let Some(draft) = current_peer.take() {
        finish_peer(draft, &mut peers)?;
    }

    let mut interface = interface.ok_or(ParseError::MissingInterface)?;
    interface.private_key = private_key.ok_or(ParseError::MissingPrivateKey)?;

    Ok(TunnelConfig {
        name: name.clone(),
        interface,
        peers,
    })
}

/// Renders a config back into the text format accepted by [`parse`].
pub fn serialize(config: &TunnelConfig) -> String {
    let mut out = String::new();
    let interface = &config.interface;

    // Writing into a String cannot fail.
    let _ = writeln!(out, "[Interface]");
    let _ = writeln!(out, "PrivateKey = {}", interface.private_key);
    if !interface.addresses.is_empty() {
        let _ = writeln!(out, "Address = {}", interface.addresses.iter().join(", "));
    }
    if let Some(port) = interface.listen_port {
        let _ = writeln!(out, "ListenPort = {}", port);
    }
    if let Some(mtu) = interface.mtu {
        let _ = writeln!(out, "MTU = {}", mtu);
    }
    if !interface.dns.is_empty() {
        let _ = writeln!(out, "DNS = {}", interface.dns.iter().join(", "));
    }

    for peer in &config.peers {
        let _ = writeln!(out);
        let _ = writeln!(out, "[Peer]");
        let _ = writeln!(out, "PublicKey = {}", peer.public_key);
        if let Some(psk) = &peer.preshared_key {
            let _ = writeln!(out, "PresharedKey = {}", psk);
        }
        if !peer.allowed_ips.is_empty() {
            let _ = writeln!(out, "AllowedIPs = {}", peer.allowed_ips.iter().join(", "));
        }
        if let Some(endpoint) = &peer.endpoint {
            let _ = writeln!(out, "Endpoint = {}", endpoint);
        }
        if let Some(keepalive) = peer.persistent_keepalive {
            let _ = writeln!(out, "PersistentKeepalive = {}", keepalive);
        }
    }

    out
}

/// Pulls the `[Interface]` private key out of possibly-invalid editor text.
pub fn extract_private_key(text: &str) -> Option<String> {
    let mut in_interface = false;
    for raw in text.lines() {
        let content = strip_comment(raw);
        if let Some(header) = content
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
        {
            in_interface = header.trim().eq_ignore_ascii_case("interface");
            continue;
        }
        if !in_interface {
            continue;
        }
        if let Some((key, value)) = content.split_once('=')
            && key.trim().eq_ignore_ascii_case("privatekey")
        {
            return Some(value.trim().to_string());
        }
    }
    None
}
