//! Construction of tool command lines.

use std::fmt;
use std::path::PathBuf;

use super::config::ToolConfig;
use super::types::{CompanyId, MigrationRequest};

/// A fully resolved command for migrating one company.
///
/// Every argument is a separate argv entry; nothing goes through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub company_id: CompanyId,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) || arg.contains('"') {
                write!(f, " {:?}", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Builds [`Invocation`]s from the configured tool location.
#[derive(Debug, Clone)]
pub struct InvocationBuilder {
    tool: ToolConfig,
}

impl InvocationBuilder {
    pub fn new(tool: ToolConfig) -> Self {
        Self { tool }
    }

    /// Builds the command line for one company of a request.
    ///
    /// Layout: `<program> <leading args> <subcommand> --cpn=<id> --dest=<env> --git_user=<user> --motive=<reason>`.
    pub fn build(&self, company_id: CompanyId, request: &MigrationRequest) -> Invocation {
        let mut args = self.tool.args.clone();
        args.push(request.direction().subcommand().to_string());
        args.push(format!("--cpn={}", company_id));
        args.push(format!("--dest={}", request.direction().environment()));
        args.push(format!("--git_user={}", request.acting_user()));
        args.push(format!("--motive={}", request.reason()));

        Invocation {
            company_id,
            program: self.tool.program.clone(),
            args,
            working_dir: self.tool.working_dir.clone(),
            env: self
                .tool
                .env
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}
