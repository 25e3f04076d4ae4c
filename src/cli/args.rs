//! Command-line argument parsing

use crate::archive::{DEFAULT_ARCHIVE_PATH, DEFAULT_IMAGES_PATH};
use crate::cli::config::AppConfig;
use crate::error::handlers::ValidationErrorHandler;
use crate::error::{Result, SyncError};
use crate::registry::{Credentials, TargetSpec};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

const EXAMPLES: &str = "\
Examples:
  # Show the references an images file would act on
  image-sync view images.txt

  # Retag for a private registry, then push with credentials
  image-sync push images.txt -n team -s registry.example.com -u admin -p secret

  # Pull from Docker Hub using credentials from the environment
  export IMAGE_SYNC_USERNAME=myuser
  export IMAGE_SYNC_PASSWORD=mypassword
  image-sync pull images.txt

  # Export every local image, then bundle a few files alongside it
  image-sync save -o images.tar.gz
  image-sync archive images.tar.gz deploy/values.yaml -o output.tar.gz";

#[derive(Parser, Debug)]
#[command(name = "image-sync")]
#[command(about = "Retag, push, pull, list and archive container images through a container engine")]
#[command(version, author, after_help = EXAMPLES)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Registry username
    #[arg(
        long = "username",
        short = 'u',
        global = true,
        env = "IMAGE_SYNC_USERNAME",
        help = "Username for registry authentication"
    )]
    pub username: Option<String>,

    /// Registry password
    #[arg(
        long = "password",
        short = 'p',
        global = true,
        env = "IMAGE_SYNC_PASSWORD",
        hide_env_values = true,
        help = "Password for registry authentication"
    )]
    pub password: Option<String>,

    /// Container engine hosts
    #[arg(
        long = "host",
        global = true,
        value_delimiter = ',',
        help = "Container engine host(s), tried in order (tcp://host:port)"
    )]
    pub hosts: Vec<String>,

    /// Timeout in seconds for a single push or pull
    #[arg(
        long = "timeout",
        short = 't',
        global = true,
        help = "Timeout for a single push or pull job in seconds"
    )]
    pub timeout: Option<u64>,

    /// Verbose output
    #[arg(long = "verbose", short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Quiet output
    #[arg(
        long = "quiet",
        short = 'q',
        global = true,
        conflicts_with = "verbose",
        help = "Only print progress lines and errors"
    )]
    pub quiet: bool,

    /// Log file path
    #[arg(
        long = "log-file",
        global = true,
        help = "Append log messages to this file (default: logs.txt)"
    )]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the references in an images file
    View {
        /// File with one image reference per line
        file: PathBuf,
    },
    /// Pull every image listed in a file
    Pull {
        file: PathBuf,
        /// Registry server the credentials belong to
        #[arg(long = "server", short = 's')]
        server: Option<String>,
    },
    /// Tag every image listed in a file for the target registry
    Tag {
        file: PathBuf,
        /// Namespace (project) under the registry server
        #[arg(long = "namespace", short = 'n')]
        namespace: String,
        /// Registry server, docker.io when omitted
        #[arg(long = "server", short = 's')]
        server: Option<String>,
    },
    /// Tag every image listed in a file, then push the tagged images
    Push {
        file: PathBuf,
        #[arg(long = "namespace", short = 'n')]
        namespace: String,
        #[arg(long = "server", short = 's')]
        server: Option<String>,
    },
    /// List every repository:tag in the local image store
    List,
    /// Export every local image into a compressed archive
    Save {
        #[arg(long = "output", short = 'o', default_value = DEFAULT_IMAGES_PATH)]
        output: PathBuf,
    },
    /// Bundle files into a compressed archive
    Archive {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        #[arg(long = "output", short = 'o', default_value = DEFAULT_ARCHIVE_PATH)]
        output: PathBuf,
    },
}

impl Args {
    pub fn parse_args() -> Self {
        Args::parse()
    }

    /// Validate arguments
    pub fn validate(&self) -> Result<()> {
        ValidationErrorHandler::validate_credentials(
            self.username.as_deref().unwrap_or(""),
            self.password.as_deref().unwrap_or(""),
        )?;

        if let Some(timeout) = self.timeout {
            ValidationErrorHandler::validate_timeout(timeout)?;
        }

        match &self.command {
            Command::View { file } | Command::Pull { file, .. } => {
                ValidationErrorHandler::validate_input_file(file)?;
            }
            Command::Tag {
                file, namespace, ..
            }
            | Command::Push {
                file, namespace, ..
            } => {
                ValidationErrorHandler::validate_input_file(file)?;
                if namespace.trim().is_empty() {
                    return Err(SyncError::Validation(
                        "Namespace cannot be empty".to_string(),
                    ));
                }
            }
            Command::List | Command::Save { .. } | Command::Archive { .. } => {}
        }

        Ok(())
    }

    /// Flags layered over `base`, which usually comes from the environment
    pub fn apply_to(&self, base: AppConfig) -> AppConfig {
        let mut config = base;
        if !self.hosts.is_empty() {
            config.engine_hosts = self.hosts.clone();
        }
        if let Some(timeout) = self.timeout {
            config.job_timeout = timeout;
        }
        if let Some(log_file) = &self.log_file {
            config.log_file = Some(log_file.clone());
        }
        config.verbose |= self.verbose;
        config.quiet |= self.quiet;
        if config.quiet {
            config.verbose = false;
        }
        config
    }

    /// Target registry and namespace for tag and push
    pub fn target_spec(&self) -> Option<TargetSpec> {
        match &self.command {
            Command::Tag {
                namespace, server, ..
            }
            | Command::Push {
                namespace, server, ..
            } => Some(TargetSpec::new(server.clone(), namespace.clone())),
            _ => None,
        }
    }

    /// Credentials for the registry the command talks to
    pub fn credentials(&self) -> Credentials {
        let server = match &self.command {
            Command::Pull { server, .. }
            | Command::Tag { server, .. }
            | Command::Push { server, .. } => server.clone().unwrap_or_default(),
            _ => String::new(),
        };

        Credentials::new(
            self.username.clone().unwrap_or_default(),
            self.password.clone().unwrap_or_default(),
            server,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_push_subcommand() {
        let args = parse(&[
            "image-sync", "push", "images.txt", "-n", "team", "-s", "registry.local", "-u",
            "admin", "-p", "secret",
        ]);

        assert_eq!(
            args.command,
            Command::Push {
                file: PathBuf::from("images.txt"),
                namespace: "team".to_string(),
                server: Some("registry.local".to_string()),
            }
        );
        let spec = args.target_spec().unwrap();
        assert_eq!(spec.server(), "registry.local");
        assert_eq!(spec.namespace, "team");

        let credentials = args.credentials();
        assert_eq!(credentials.username, "admin");
        assert_eq!(credentials.server, "registry.local");
    }

    #[test]
    fn test_defaults_for_output_paths() {
        match parse(&["image-sync", "save"]).command {
            Command::Save { output } => assert_eq!(output, PathBuf::from("images.tar.gz")),
            other => panic!("unexpected command {:?}", other),
        }
        match parse(&["image-sync", "archive", "a.txt", "b.txt"]).command {
            Command::Archive { paths, output } => {
                assert_eq!(paths, vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")]);
                assert_eq!(output, PathBuf::from("output.tar.gz"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_archive_requires_paths() {
        assert!(Args::try_parse_from(["image-sync", "archive"]).is_err());
    }

    #[test]
    fn test_tag_requires_namespace() {
        assert!(Args::try_parse_from(["image-sync", "tag", "images.txt"]).is_err());
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Args::try_parse_from(["image-sync", "list", "-v", "-q"]).is_err());
    }

    #[test]
    fn test_flags_override_config() {
        let args = parse(&[
            "image-sync",
            "list",
            "--host",
            "tcp://a:2375,tcp://b:2375",
            "--timeout",
            "15",
            "--log-file",
            "sync.log",
            "--quiet",
        ]);
        let config = args.apply_to(AppConfig {
            verbose: true,
            ..AppConfig::default()
        });

        assert_eq!(config.engine_hosts, vec!["tcp://a:2375", "tcp://b:2375"]);
        assert_eq!(config.job_timeout, 15);
        assert_eq!(config.log_file, Some(PathBuf::from("sync.log")));
        assert!(config.quiet);
        assert!(!config.verbose);
    }

    #[test]
    fn test_validate_rejects_blank_namespace_and_half_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("images.txt");
        std::fs::write(&file, "alpine\n").unwrap();
        let file = file.to_string_lossy().to_string();

        let blank = parse(&["image-sync", "tag", file.as_str(), "-n", " "]);
        assert!(blank.validate().is_err());

        let half = parse(&["image-sync", "tag", file.as_str(), "-n", "team", "-u", "admin"]);
        assert!(half.validate().is_err());

        let ok = parse(&["image-sync", "tag", file.as_str(), "-n", "team"]);
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_validate_missing_images_file() {
        let args = parse(&["image-sync", "view", "/nonexistent/images.txt"]);
        assert!(matches!(args.validate(), Err(SyncError::Validation(_))));
    }
}
