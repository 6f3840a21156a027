//! Extraction through the `mysqldump` client.

use super::{send_line, ExtractRequest, Extractor, LineSender};
use crate::config::ConnectionSettings;
use crate::error::ExtractError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

/// Flags that make mysqldump emit one data-only INSERT per line
const FIXED_ARGS: &[&str] = &[
    "--single-transaction",
    "--compact",
    "--skip-lock-tables",
    "--skip-opt",
    "--quick",
    "--skip-extended-insert",
    "--tz-utc",
    "--hex-blob",
    "--no-create-info",
];

/// Runs one `mysqldump` process per table
#[derive(Debug, Clone)]
pub struct MysqlDumpExtractor {
    program: PathBuf,
    connection: ConnectionSettings,
    default_character_set: Option<String>,
    /// In megabytes
    max_allowed_packet: Option<u64>,
}

impl MysqlDumpExtractor {
    /// Resolve `binpath` (a name looked up on PATH, or a path)
    pub fn new(binpath: &str, connection: ConnectionSettings) -> Result<Self, ExtractError> {
        let program = find_program(binpath).ok_or_else(|| ExtractError::BinaryNotFound {
            program: binpath.to_string(),
        })?;
        debug!("Using {}", program.display());

        Ok(Self {
            program,
            connection,
            default_character_set: None,
            max_allowed_packet: None,
        })
    }

    pub fn with_character_set(mut self, charset: Option<String>) -> Self {
        self.default_character_set = charset.filter(|c| !c.is_empty());
        self
    }

    pub fn with_max_allowed_packet(mut self, megabytes: Option<u64>) -> Self {
        self.max_allowed_packet = megabytes;
        self
    }

    /// Full argument vector for one table
    pub fn build_args(&self, request: &ExtractRequest) -> Vec<String> {
        let mut args = Vec::with_capacity(FIXED_ARGS.len() + request.extra_options.len() + 8);

        match self.connection.socket.as_deref().filter(|s| !s.is_empty()) {
            Some(socket) => args.push(format!("--socket={}", socket)),
            None => {
                args.push(format!("--host={}", self.connection.host));
                args.push(format!("--port={}", self.connection.port));
            }
        }
        args.push(format!("--user={}", self.connection.user));
        if let Some(password) = self.connection.password.as_deref() {
            args.push(format!("--password={}", password));
        }

        args.extend(FIXED_ARGS.iter().map(|a| a.to_string()));

        if let Some(charset) = &self.default_character_set {
            args.push(format!("--default-character-set={}", charset));
        }
        if let Some(megabytes) = self.max_allowed_packet {
            args.push(format!("--max-allowed-packet={}M", megabytes));
        }
        if let Some(clause) = where_argument(request) {
            args.push(format!("--where={}", clause));
        }

        args.extend(request.extra_options.iter().cloned());
        args.push(request.database.clone());
        args.push(request.table.clone());
        args
    }
}

/// mysqldump has no ORDER BY / LIMIT flags, so they ride along in `--where`
fn where_argument(request: &ExtractRequest) -> Option<String> {
    if request.where_clause.is_none() && request.order.is_none() && request.limit.is_none() {
        return None;
    }

    let mut clause = request
        .where_clause
        .clone()
        .unwrap_or_else(|| "1=1".to_string());
    if let Some(order) = &request.order {
        clause.push_str(" ORDER BY ");
        clause.push_str(order);
    }
    if let Some(limit) = request.limit {
        clause.push_str(&format!(" LIMIT {}", limit));
    }
    Some(clause)
}

/// Argument vector safe for logging
fn masked_args(args: &[String]) -> Vec<String> {
    args.iter()
        .map(|a| {
            if a.starts_with("--password=") {
                "--password=******".to_string()
            } else {
                a.clone()
            }
        })
        .collect()
}

fn find_program(binpath: &str) -> Option<PathBuf> {
    let path = Path::new(binpath);
    if path.components().count() > 1 {
        return path.is_file().then(|| path.to_path_buf());
    }

    let search = std::env::var_os("PATH")?;
    std::env::split_paths(&search)
        .map(|dir| dir.join(binpath))
        .find(|candidate| candidate.is_file())
}

#[async_trait]
impl Extractor for MysqlDumpExtractor {
    async fn extract(&self, request: ExtractRequest, lines: LineSender) -> Result<(), ExtractError> {
        let table = request.table.as_str();
        send_line(&lines, table, request.use_statement()).await?;

        let args = self.build_args(&request);
        debug!(
            "Running {} {}",
            self.program.display(),
            masked_args(&args).join(" ")
        );

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExtractError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            ExtractError::Io(std::io::Error::other("child stdout not captured"))
        })?;
        let mut stderr = child.stderr.take().ok_or_else(|| {
            ExtractError::Io(std::io::Error::other("child stderr not captured"))
        })?;

        let pump = async {
            let mut reader = BufReader::new(stdout);
            let mut buf = Vec::with_capacity(8 * 1024);
            loop {
                buf.clear();
                if reader.read_until(b'\n', &mut buf).await? == 0 {
                    return Ok::<(), ExtractError>(());
                }
                while matches!(buf.last(), Some(b'\n' | b'\r')) {
                    buf.pop();
                }
                send_line(&lines, table, buf.clone()).await?;
            }
        };
        let drain = async {
            let mut captured = Vec::new();
            stderr.read_to_end(&mut captured).await.map(|_| captured)
        };

        let (pumped, captured) = tokio::join!(pump, drain);
        let status = child.wait().await?;
        let captured = captured?;

        if !status.success() {
            return Err(ExtractError::Failed {
                table: table.to_string(),
                status: status.to_string(),
                stderr: String::from_utf8_lossy(&captured).trim().to_string(),
            });
        }
        pumped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor(connection: ConnectionSettings) -> MysqlDumpExtractor {
        MysqlDumpExtractor {
            program: PathBuf::from("mysqldump"),
            connection,
            default_character_set: Some("utf8mb4".to_string()),
            max_allowed_packet: Some(64),
        }
    }

    #[test]
    fn test_build_args() {
        let mut connection = ConnectionSettings::default();
        connection.password = Some("secret".to_string());
        let request = ExtractRequest {
            database: "shop".to_string(),
            destination_database: "shop".to_string(),
            table: "orders".to_string(),
            where_clause: Some("(`id` > 1)".to_string()),
            order: Some("id DESC".to_string()),
            limit: Some(10),
            extra_options: vec!["--set-gtid-purged=OFF".to_string()],
            ..Default::default()
        };

        let args = extractor(connection).build_args(&request);
        assert_eq!(args[0], "--host=127.0.0.1");
        assert_eq!(args[1], "--port=3306");
        assert!(args.contains(&"--no-create-info".to_string()));
        assert!(args.contains(&"--default-character-set=utf8mb4".to_string()));
        assert!(args.contains(&"--max-allowed-packet=64M".to_string()));
        assert!(args.contains(&"--where=(`id` > 1) ORDER BY id DESC LIMIT 10".to_string()));
        assert_eq!(&args[args.len() - 3..], &["--set-gtid-purged=OFF", "shop", "orders"]);

        let masked = masked_args(&args);
        assert!(masked.contains(&"--password=******".to_string()));
        assert!(!masked.iter().any(|a| a.contains("secret")));
    }

    #[test]
    fn test_socket_and_bare_limit() {
        let mut connection = ConnectionSettings::default();
        connection.socket = Some("/tmp/mysql.sock".to_string());
        let request = ExtractRequest {
            table: "t".to_string(),
            limit: Some(5),
            ..Default::default()
        };

        let args = extractor(connection).build_args(&request);
        assert_eq!(args[0], "--socket=/tmp/mysql.sock");
        assert!(!args.iter().any(|a| a.starts_with("--host")));
        assert!(args.contains(&"--where=1=1 LIMIT 5".to_string()));
    }

    #[test]
    fn test_missing_binary() {
        let result = MysqlDumpExtractor::new(
            "definitely-not-a-real-mysqldump-binary",
            ConnectionSettings::default(),
        );
        assert!(matches!(result, Err(ExtractError::BinaryNotFound { .. })));
    }
}
