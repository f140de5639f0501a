use anyhow::Result;
use dotenvy::dotenv;
use ipnet::IpNet;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub session_ttl_secs: u64,
    pub admin_allowed_ips: AllowedIps,
    pub trusted_proxy_depth: usize,
    pub cors_allowed_origins: Option<String>,
    pub log_request_body: bool,
}

#[derive(Debug, Clone)]
pub enum AllowedIps {
    Any,
    Cidrs(Vec<IpNet>),
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        let admin_allowed_ips =
            parse_allowed_ips(&env::var("ADMIN_ALLOWED_IPS").unwrap_or_else(|_| "*".to_string()))?;

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL")?,
            session_ttl_secs: env::var("SESSION_TTL_SECS")
                .unwrap_or_else(|_| "86400".to_string())
                .parse()?,
            admin_allowed_ips,
            trusted_proxy_depth: env::var("TRUSTED_PROXY_DEPTH")
                .unwrap_or_else(|_| "0".to_string())
                .parse()?,
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS").ok(),
            log_request_body: env::var("LOG_REQUEST_BODY")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
        })
    }
}

fn parse_allowed_ips(raw: &str) -> anyhow::Result<AllowedIps> {
    let value = raw.trim();
    if value == "*" {
        return Ok(AllowedIps::Any);
    }

    let cidrs = value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::parse::<IpNet>)
        .collect::<Result<Vec<_>, _>>()?;

    if cidrs.is_empty() {
        anyhow::bail!("ADMIN_ALLOWED_IPS must be '*' or a comma-separated list of CIDRs");
    }

    Ok(AllowedIps::Cidrs(cidrs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_allows_any() {
        assert!(matches!(parse_allowed_ips("*").unwrap(), AllowedIps::Any));
    }

    #[test]
    fn parses_cidr_list() {
        let parsed = parse_allowed_ips("10.0.0.0/8, 192.168.1.0/24").unwrap();
        match parsed {
            AllowedIps::Cidrs(cidrs) => assert_eq!(cidrs.len(), 2),
            AllowedIps::Any => panic!("expected cidr list"),
        }
    }

    #[test]
    fn rejects_empty_list() {
        assert!(parse_allowed_ips(" , ").is_err());
        assert!(parse_allowed_ips("not-a-cidr").is_err());
    }
}
