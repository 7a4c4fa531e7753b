//! Port specification parsing

use crate::top_ports;
use crate::ScanError;

/// Parse a port specification into a sorted, deduplicated list.
///
/// Accepts comma-separated ports and inclusive ranges (`80,443,8000-8100`)
/// or one of the symbolic groups `full`, `top-100`, `top-1000`.
pub fn parse_ports(spec: &str) -> crate::Result<Vec<u16>> {
    let spec = spec.trim();

    let mut ports: Vec<u16> = match spec.to_lowercase().as_str() {
        "full" | "-" => (1..=65535).collect(),
        "top-100" => top_ports::top_100(),
        "top-1000" => top_ports::top_1000(),
        _ => {
            let mut out = Vec::new();
            for part in spec.split(',') {
                let part = part.trim();
                if part.is_empty() {
                    return Err(ScanError::PortRangeError(format!(
                        "empty entry in port spec '{}'",
                        spec
                    )));
                }
                if let Some((start, end)) = part.split_once('-') {
                    let start = parse_port(start)?;
                    let end = parse_port(end)?;
                    if start > end {
                        return Err(ScanError::PortRangeError(format!(
                            "invalid port range: {}",
                            part
                        )));
                    }
                    out.extend(start..=end);
                } else {
                    out.push(parse_port(part)?);
                }
            }
            out
        }
    };

    ports.sort_unstable();
    ports.dedup();

    if ports.is_empty() {
        return Err(ScanError::PortRangeError("no ports specified".to_string()));
    }
    Ok(ports)
}

/// Remove excluded ports from a parsed list.
pub fn apply_exclusions(ports: &mut Vec<u16>, excluded: &[u16]) {
    ports.retain(|port| !excluded.contains(port));
}

fn parse_port(s: &str) -> crate::Result<u16> {
    let port: u16 = s
        .trim()
        .parse()
        .map_err(|_| ScanError::PortRangeError(format!("invalid port: '{}'", s.trim())))?;
    if port == 0 {
        return Err(ScanError::PortRangeError(
            "port 0 is not scannable".to_string(),
        ));
    }
    Ok(port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list() {
        assert_eq!(parse_ports("80,443,22").unwrap(), vec![22, 80, 443]);
    }

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_ports("8000-8003").unwrap(), vec![8000, 8001, 8002, 8003]);
    }

    #[test]
    fn test_parse_mixed_with_duplicates() {
        assert_eq!(parse_ports("80, 79-81").unwrap(), vec![79, 80, 81]);
    }

    #[test]
    fn test_parse_full() {
        let ports = parse_ports("full").unwrap();
        assert_eq!(ports.len(), 65535);
        assert_eq!(ports[0], 1);
        assert_eq!(ports[65534], 65535);
    }

    #[test]
    fn test_parse_top_groups() {
        assert_eq!(parse_ports("top-100").unwrap().len(), 100);
        assert!(parse_ports("top-1000").unwrap().contains(&3306));
    }

    #[test]
    fn test_invalid_specs_rejected() {
        assert!(parse_ports("0").is_err());
        assert!(parse_ports("80,,443").is_err());
        assert!(parse_ports("1024-1").is_err());
        assert!(parse_ports("http").is_err());
        assert!(parse_ports("65536").is_err());
    }

    #[test]
    fn test_apply_exclusions() {
        let mut ports = vec![22, 80, 443];
        apply_exclusions(&mut ports, &[80]);
        assert_eq!(ports, vec![22, 443]);
    }
}
