use std::path::Path;

use anyhow::Context;
use mcsc::{channel::ChannelConfig, classfile::ClassFile};

use crate::app::GlobalOptions;

/// Read and parse a class file.
pub fn load_class(path: &Path) -> anyhow::Result<(Vec<u8>, ClassFile)> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let class = ClassFile::parse(&bytes)
        .with_context(|| format!("failed to parse class file: {}", path.display()))?;
    Ok((bytes, class))
}

/// Channel settings from the global options.
pub fn channel_config(opts: &GlobalOptions) -> ChannelConfig {
    match &opts.pipe {
        Some(path) => ChannelConfig::default().with_path(path),
        None => ChannelConfig::default(),
    }
}
