pub mod completions;
pub mod serve;
pub mod storage;
pub mod wizard;

use essence_core::{EssenceConfig, RecipeError, Storage};
use std::path::{Path, PathBuf};

use crate::output::OutputMode;

/// Everything a command needs besides its own arguments.
#[derive(Debug)]
pub struct CmdContext {
    pub output: OutputMode,
    pub quiet: bool,
    pub config: EssenceConfig,
    pub storage_dir: PathBuf,
}

impl CmdContext {
    pub fn new(
        output: OutputMode,
        quiet: bool,
        config: EssenceConfig,
        storage_flag: Option<PathBuf>,
        project_root: &Path,
    ) -> Self {
        let storage_dir =
            storage_flag.unwrap_or_else(|| config.storage.resolved_dir(project_root));
        Self {
            output,
            quiet,
            config,
            storage_dir,
        }
    }

    pub fn storage(&self) -> Result<Storage, RecipeError> {
        self.config.storage.open(&self.storage_dir)
    }

    /// Skip confirmations in quiet mode unless JSON was asked for.
    pub const fn chatty(&self) -> bool {
        self.output.is_json() || !self.quiet
    }
}
