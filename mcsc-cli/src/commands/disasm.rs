use std::{path::Path, process::ExitCode};

use anyhow::bail;
use mcsc::{
    assembly::{decode_stream, Instruction},
    classfile::{ClassFile, ConstantPool, MemberInfo},
};
use serde::Serialize;

use crate::{
    app::GlobalOptions,
    commands::common::load_class,
    output::{print_output, Align, TabWriter},
};

#[derive(Debug, Serialize)]
pub struct MethodListing {
    pub name: String,
    pub descriptor: String,
    pub access: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_stack: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_locals: Option<u16>,
    pub instructions: Vec<InstructionRow>,
}

#[derive(Debug, Serialize)]
pub struct InstructionRow {
    pub offset: u32,
    pub mnemonic: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub operand: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// The referenced member or class, for instructions with a constant pool operand.
fn describe_constant(pool: &ConstantPool, instruction: &Instruction) -> Option<String> {
    let index = instruction.constant_index()?;
    if let Ok(member) = pool.member_ref(index) {
        return Some(format!("{}.{}:{}", member.owner, member.name, member.descriptor));
    }
    if let Ok((name, descriptor)) = pool.name_and_type(index) {
        return Some(format!("{name}:{descriptor}"));
    }
    pool.class_name(index).ok()
}

fn list_method(class: &ClassFile, member: &MemberInfo) -> anyhow::Result<MethodListing> {
    let mut listing = MethodListing {
        name: class.member_name(member)?,
        descriptor: class.member_descriptor(member)?,
        access: format!("{:?}", member.access_flags),
        max_stack: None,
        max_locals: None,
        instructions: Vec::new(),
    };
    if class.code_attribute_index(member).is_none() {
        return Ok(listing);
    }

    let code = class.code(member)?;
    listing.max_stack = Some(code.max_stack);
    listing.max_locals = Some(code.max_locals);
    for instruction in decode_stream(&code.code)? {
        let mnemonic = if instruction.wide {
            format!("wide {}", instruction.mnemonic)
        } else {
            instruction.mnemonic.to_string()
        };
        listing.instructions.push(InstructionRow {
            offset: instruction.offset,
            mnemonic,
            operand: instruction.operand.to_string(),
            comment: describe_constant(&class.constant_pool, &instruction),
        });
    }
    Ok(listing)
}

fn print_listing(listing: &MethodListing) {
    println!("{} {}{}", listing.access, listing.name, listing.descriptor);
    match (listing.max_stack, listing.max_locals) {
        (Some(stack), Some(locals)) => println!("  stack={stack}, locals={locals}"),
        _ => {
            println!("  (no code)");
            println!();
            return;
        }
    }

    let mut tw = TabWriter::new(vec![
        ("", Align::Right),
        ("", Align::Left),
        ("", Align::Left),
        ("", Align::Left),
    ])
    .indent("  ");
    for row in &listing.instructions {
        tw.row(vec![
            format!("{}:", row.offset),
            row.mnemonic.clone(),
            row.operand.clone(),
            row.comment
                .as_ref()
                .map_or_else(String::new, |comment| format!("// {comment}")),
        ]);
    }
    tw.print();
    println!();
}

pub fn run(path: &Path, method: Option<&str>, opts: &GlobalOptions) -> anyhow::Result<ExitCode> {
    let (_, class) = load_class(path)?;

    let mut listings = Vec::new();
    for member in &class.methods {
        if let Some(wanted) = method {
            if class.member_name(member)? != wanted {
                continue;
            }
        }
        listings.push(list_method(&class, member)?);
    }
    if let Some(wanted) = method {
        if listings.is_empty() {
            bail!("no methods named '{wanted}' found");
        }
    }

    let class_name = class.class_name()?;
    print_output(&listings, opts, |listings| {
        println!("class {class_name}");
        println!();
        for listing in listings {
            print_listing(listing);
        }
    })?;
    Ok(ExitCode::SUCCESS)
}
