//! Parses the `seeds` configuration option into `(host, port)` pairs.

use crate::error::Error;

/// Parses a comma-separated list of `host:port` tokens. Empty tokens are
/// skipped. Fails if, after parsing, no seed remains.
pub fn parse_seeds(seeds: &str) -> Result<Vec<(String, u16)>, Error> {
    let mut parsed = Vec::new();

    for token in seeds.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }

        let (host, port) = token.rsplit_once(':').ok_or_else(|| Error::InvalidSeeds {
            seeds: seeds.to_string(),
            reason: format!("seed '{token}' is not in host:port form"),
        })?;

        if host.is_empty() {
            return Err(Error::InvalidSeeds {
                seeds: seeds.to_string(),
                reason: format!("seed '{token}' is missing a host"),
            });
        }

        let port: u16 = port.parse().map_err(|_| Error::InvalidSeeds {
            seeds: seeds.to_string(),
            reason: format!("seed '{token}' has an invalid port"),
        })?;

        parsed.push((host.to_string(), port));
    }

    if parsed.is_empty() {
        return Err(Error::InvalidSeeds {
            seeds: seeds.to_string(),
            reason: "no usable seed found".to_string(),
        });
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_separated_seeds() {
        let seeds = parse_seeds("h1:9092,h2:9092").unwrap();
        assert_eq!(
            seeds,
            vec![("h1".to_string(), 9092), ("h2".to_string(), 9092)]
        );
    }

    #[test]
    fn skips_empty_tokens() {
        let seeds = parse_seeds("h1:9092,,h2:9092,").unwrap();
        assert_eq!(seeds.len(), 2);
    }

    #[test]
    fn rejects_empty_seed_list() {
        let err = parse_seeds(",,").unwrap_err();
        assert!(matches!(err, Error::InvalidSeeds { .. }));
    }

    #[test]
    fn rejects_malformed_token() {
        let err = parse_seeds("not-a-host-port").unwrap_err();
        assert!(matches!(err, Error::InvalidSeeds { .. }));
    }

    #[test]
    fn rejects_invalid_port() {
        let err = parse_seeds("h1:notaport").unwrap_err();
        assert!(matches!(err, Error::InvalidSeeds { .. }));
    }
}
