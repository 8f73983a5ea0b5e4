use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::Context;
use mcsc::{
    classfile::ClassFile,
    patcher::{locate, HookSymbol, InjectOptions, MethodCode, DEFAULT_HOST_ROOT},
};
use serde::Serialize;

use crate::{
    app::GlobalOptions,
    commands::common::load_class,
    output::{print_output, Align, TabWriter},
};

pub struct PatchOptions<'a> {
    pub output: &'a PathBuf,
    pub method: &'a str,
    pub roots: &'a [String],
    pub hook_owner: &'a str,
    pub hook_name: &'a str,
    pub hook_descriptor: &'a str,
}

impl PatchOptions<'_> {
    fn inject_options(&self) -> InjectOptions {
        let roots = if self.roots.is_empty() {
            vec![DEFAULT_HOST_ROOT.to_string()]
        } else {
            self.roots.to_vec()
        };
        InjectOptions::default()
            .with_method(self.method)
            .with_roots(roots)
            .with_hook(HookSymbol::new(
                self.hook_owner,
                self.hook_name,
                self.hook_descriptor,
            ))
    }
}

#[derive(Debug, Serialize)]
pub struct PatchReport {
    pub class: String,
    pub method: String,
    pub output: String,
    pub hook: String,
    pub store_index: usize,
    pub local_slot: u16,
    pub original_size: usize,
    pub patched_size: usize,
}

pub fn run(path: &Path, opts: &PatchOptions<'_>, global: &GlobalOptions) -> anyhow::Result<ExitCode> {
    let (bytes, class) = load_class(path)?;
    let options = opts.inject_options();

    // Locate separately so the report can show where the hook went
    let member = class
        .method(&options.method)
        .with_context(|| format!("method '{}' not found in {}", options.method, path.display()))?;
    let code = MethodCode::new(class.code(member)?)?;
    let point = locate(&code, &class.constant_pool, &options.roots)
        .with_context(|| format!("cannot patch {}", path.display()))?;

    let patched = mcsc::patcher::inject(&bytes, &options)
        .with_context(|| format!("cannot patch {}", path.display()))?;
    // A patched class must read back
    ClassFile::parse(&patched).context("patched class does not parse")?;
    std::fs::write(opts.output, &patched)
        .with_context(|| format!("failed to write {}", opts.output.display()))?;

    let report = PatchReport {
        class: class.class_name()?,
        method: options.method.clone(),
        output: opts.output.display().to_string(),
        hook: options.hook.to_string(),
        store_index: point.store_index,
        local_slot: point.local_slot,
        original_size: bytes.len(),
        patched_size: patched.len(),
    };

    print_output(&report, global, |r| {
        let mut tw = TabWriter::new(vec![("", Align::Left), ("", Align::Left)]);
        tw.row(vec!["Class".into(), r.class.clone()]);
        tw.row(vec!["Method".into(), r.method.clone()]);
        tw.row(vec!["Hook".into(), r.hook.clone()]);
        tw.row(vec![
            "Injected".into(),
            format!("after instruction #{} (store to local {})", r.store_index, r.local_slot),
        ]);
        tw.row(vec![
            "Size".into(),
            format!("{} -> {} bytes", r.original_size, r.patched_size),
        ]);
        tw.row(vec!["Output".into(), r.output.clone()]);
        tw.print();
    })?;

    Ok(ExitCode::SUCCESS)
}
