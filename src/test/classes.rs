//! Class file fixtures for patcher and codec tests.

use crate::classfile::{
    code::{CodeAttr, CodeAttribute, FrameKind, LineNumber, StackMapFrame, VerificationType},
    AccessFlags, Attribute, ConstantPool, MAGIC,
};
use crate::file::io::push_be;

/// Internal name of the host root type.
pub const SERVER_TYPE: &str = "net/minecraft/server/MinecraftServer";

struct MethodDef {
    name: String,
    descriptor: String,
    code: CodeAttribute,
}

/// Assembles minimal but valid class files around hand-written code arrays.
///
/// Every method is `public static` and gets a `Code` attribute; the class extends
/// `java/lang/Object` and has no fields or class attributes.
pub struct ClassBuilder {
    pool: ConstantPool,
    this_class: u16,
    super_class: u16,
    methods: Vec<MethodDef>,
}

impl ClassBuilder {
    pub fn new(name: &str) -> Self {
        let mut pool = ConstantPool::new();
        let this_class = pool.find_or_add_class(name).unwrap();
        let super_class = pool.find_or_add_class("java/lang/Object").unwrap();
        ClassBuilder {
            pool,
            this_class,
            super_class,
            methods: Vec::new(),
        }
    }

    /// Add (or reuse) a `Methodref` so code arrays can reference it.
    pub fn method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        self.pool
            .find_or_add_method_ref(owner, name, descriptor)
            .unwrap()
    }

    /// Add (or reuse) a `Utf8` constant, e.g. a sub-attribute name.
    pub fn utf8(&mut self, value: &str) -> u16 {
        self.pool.find_or_add_utf8(value).unwrap()
    }

    pub fn method(
        self,
        name: &str,
        descriptor: &str,
        code: Vec<u8>,
        max_stack: u16,
        max_locals: u16,
    ) -> Self {
        self.method_with(
            name,
            descriptor,
            CodeAttribute {
                max_stack,
                max_locals,
                code,
                exception_table: vec![],
                attributes: vec![],
            },
        )
    }

    pub fn method_with(mut self, name: &str, descriptor: &str, code: CodeAttribute) -> Self {
        self.methods.push(MethodDef {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            code,
        });
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        let code_name = self.utf8("Code");
        let mut methods = Vec::new();
        for method in &self.methods {
            let name_index = self.pool.find_or_add_utf8(&method.name).unwrap();
            let descriptor_index = self.pool.find_or_add_utf8(&method.descriptor).unwrap();
            let info = method.code.to_bytes().unwrap();
            methods.push((name_index, descriptor_index, info));
        }

        let mut out = Vec::new();
        push_be(&mut out, MAGIC);
        push_be(&mut out, 0u16);
        push_be(&mut out, 52u16);
        self.pool.write(&mut out).unwrap();
        push_be(&mut out, (AccessFlags::PUBLIC | AccessFlags::SUPER).bits());
        push_be(&mut out, self.this_class);
        push_be(&mut out, self.super_class);
        push_be(&mut out, 0u16); // interfaces
        push_be(&mut out, 0u16); // fields
        push_be(&mut out, methods.len() as u16);
        for (name_index, descriptor_index, info) in methods {
            push_be(&mut out, (AccessFlags::PUBLIC | AccessFlags::STATIC).bits());
            push_be(&mut out, name_index);
            push_be(&mut out, descriptor_index);
            push_be(&mut out, 1u16);
            Attribute {
                name_index: code_name,
                info,
            }
            .write(&mut out)
            .unwrap();
        }
        push_be(&mut out, 0u16); // attributes
        out
    }
}

/// A server entry point in the shape the patcher looks for.
///
/// ```text
///  0: aconst_null
///  1: invokestatic  MinecraftServer.spin(Function)MinecraftServer
///  4: astore_1
///  5: aload_1
///  6: ifnonnull     11
///  9: aconst_null
/// 10: athrow
/// 11: return
/// ```
///
/// The method carries a `LineNumberTable` and a `StackMapTable` frame at 11 so that
/// relocation of both can be observed.
pub fn server_main_class() -> Vec<u8> {
    let mut builder = ClassBuilder::new("net/minecraft/server/Main");
    let spin = builder.method_ref(
        SERVER_TYPE,
        "spin",
        "(Ljava/util/function/Function;)Lnet/minecraft/server/MinecraftServer;",
    );
    let lines = builder.utf8("LineNumberTable");
    let frames = builder.utf8("StackMapTable");
    let server_class = builder.pool.find_or_add_class(SERVER_TYPE).unwrap();
    let [hi, lo] = spin.to_be_bytes();

    let code = CodeAttribute {
        max_stack: 1,
        max_locals: 2,
        code: vec![0x01, 0xB8, hi, lo, 0x4C, 0x2B, 0xC7, 0x00, 0x05, 0x01, 0xBF, 0xB1],
        exception_table: vec![],
        attributes: vec![
            CodeAttr::LineNumbers {
                name_index: lines,
                entries: vec![
                    LineNumber {
                        start_pc: 0,
                        line: 20,
                    },
                    LineNumber {
                        start_pc: 5,
                        line: 21,
                    },
                    LineNumber {
                        start_pc: 11,
                        line: 23,
                    },
                ],
            },
            CodeAttr::StackMapTable {
                name_index: frames,
                frames: vec![StackMapFrame {
                    offset: 11,
                    kind: FrameKind::Append(vec![VerificationType::Object(server_class)]),
                }],
            },
        ],
    };

    builder
        .method("helper", "()V", vec![0xB1], 0, 0)
        .method_with("main", "([Ljava/lang/String;)V", code)
        .build()
}
