//! Patching synthesized entry classes through the public API.

use mcsc::{
    assembly::decode_stream,
    classfile::{
        code::{CodeAttribute, ExceptionEntry},
        AccessFlags, Attribute, ClassFile, ConstantPool, MemberInfo,
    },
    patcher::{inject, locate, HookSymbol, InjectOptions, MethodCode},
    Error, PatchError,
};

const SERVER: &str = "net/minecraft/server/MinecraftServer";

/// Class `demo/Launcher` with `public static main([Ljava/lang/String;)V` around `code`.
///
/// `build` receives the pool so it can allocate the constants its code references.
fn launcher(build: impl FnOnce(&mut ConstantPool) -> CodeAttribute) -> Vec<u8> {
    let mut pool = ConstantPool::new();
    let this_class = pool.find_or_add_class("demo/Launcher").unwrap();
    let super_class = pool.find_or_add_class("java/lang/Object").unwrap();
    let code = build(&mut pool);

    let method = MemberInfo {
        access_flags: AccessFlags::PUBLIC | AccessFlags::STATIC,
        name_index: pool.find_or_add_utf8("main").unwrap(),
        descriptor_index: pool.find_or_add_utf8("([Ljava/lang/String;)V").unwrap(),
        attributes: vec![Attribute {
            name_index: pool.find_or_add_utf8("Code").unwrap(),
            info: code.to_bytes().unwrap(),
        }],
    };

    ClassFile {
        minor_version: 0,
        major_version: 52,
        constant_pool: pool,
        access_flags: AccessFlags::PUBLIC | AccessFlags::SUPER,
        this_class,
        super_class,
        interfaces: vec![],
        fields: vec![],
        methods: vec![method],
        attributes: vec![],
    }
    .to_bytes()
    .unwrap()
}

fn simple_code(code: Vec<u8>) -> CodeAttribute {
    CodeAttribute {
        max_stack: 1,
        max_locals: 3,
        code,
        exception_table: vec![],
        attributes: vec![],
    }
}

/// ```text
///  0: aconst_null
///  1: astore_1
///  2: invokestatic MinecraftServer.spin()LMinecraftServer;
///  5: astore_2
///  6: aload_2
///  7: ifnull 13
/// 10: aload_2
/// 11: pop
/// 12: nop
/// 13: return
/// ```
/// with a catch-all handler at 12 covering 2..10.
fn guarded_launcher() -> Vec<u8> {
    launcher(|pool| {
        let spin = pool
            .find_or_add_method_ref(SERVER, "spin", "()Lnet/minecraft/server/MinecraftServer;")
            .unwrap();
        let [hi, lo] = spin.to_be_bytes();
        let mut code = simple_code(vec![
            0x01, 0x4C, 0xB8, hi, lo, 0x4D, 0x2C, 0xC6, 0x00, 0x06, 0x2C, 0x57, 0x00, 0xB1,
        ]);
        code.exception_table.push(ExceptionEntry {
            start_pc: 2,
            end_pc: 10,
            handler_pc: 12,
            catch_type: 0,
        });
        code
    })
}

fn main_code(bytes: &[u8]) -> (ClassFile, CodeAttribute) {
    let class = ClassFile::parse(bytes).unwrap();
    let method = class.method("main").unwrap();
    let code = class.code(method).unwrap();
    (class, code)
}

#[test]
fn locates_store_after_construction() {
    let (class, code) = main_code(&guarded_launcher());
    let method = MethodCode::new(code).unwrap();
    let point = locate(&method, &class.constant_pool, &[SERVER.replace('/', ".")]).unwrap();

    assert_eq!(point.call_index, 2);
    assert_eq!(point.store_index, 3);
    assert_eq!(point.local_slot, 2);
}

#[test]
fn inject_inserts_only_the_hook_pair() {
    let original = guarded_launcher();
    let patched = inject(&original, &InjectOptions::default()).unwrap();

    let (_, before) = main_code(&original);
    let (class, after) = main_code(&patched);

    let mnemonics = |code: &[u8]| -> Vec<&'static str> {
        decode_stream(code)
            .unwrap()
            .iter()
            .map(|instruction| instruction.mnemonic)
            .collect()
    };
    let mut expected = mnemonics(&before.code);
    expected.insert(4, "aload_2");
    expected.insert(5, "invokestatic");
    assert_eq!(mnemonics(&after.code), expected);
    assert_eq!(after.code.len(), before.code.len() + 4);

    let instructions = decode_stream(&after.code).unwrap();
    let hook = class
        .constant_pool
        .member_ref(instructions[5].constant_index().unwrap())
        .unwrap();
    assert_eq!(hook.owner, "server/Main");
    assert_eq!(hook.name, "init");
    assert_eq!(hook.descriptor, "(Ljava/lang/Object;)V");
}

#[test]
fn branches_and_handlers_keep_their_targets() {
    let patched = inject(&guarded_launcher(), &InjectOptions::default()).unwrap();
    let (_, code) = main_code(&patched);
    let instructions = decode_stream(&code.code).unwrap();

    let ifnull = instructions
        .iter()
        .find(|instruction| instruction.mnemonic == "ifnull")
        .unwrap();
    let target = ifnull.targets()[0];
    let landing = instructions
        .iter()
        .find(|instruction| instruction.offset == target)
        .unwrap();
    assert_eq!(landing.mnemonic, "return");

    let entry = &code.exception_table[0];
    assert_eq!(entry.start_pc, 2);
    assert_eq!(entry.end_pc, 14);
    assert_eq!(entry.handler_pc, 16);
    let handler = instructions
        .iter()
        .find(|instruction| instruction.offset == entry.handler_pc)
        .unwrap();
    assert_eq!(handler.mnemonic, "nop");
}

#[test]
fn custom_hook_and_method() {
    let bytes = launcher(|pool| {
        let make = pool
            .find_or_add_method_ref("demo/Boot", "make", "()Ldemo/Host;")
            .unwrap();
        let [hi, lo] = make.to_be_bytes();
        simple_code(vec![0xB8, hi, lo, 0x4C, 0xB1])
    });

    let options = InjectOptions::default()
        .with_roots(["demo.Host"])
        .with_hook(HookSymbol::new("demo.Hooks", "attach", "(Ljava/lang/Object;)V"));
    let patched = inject(&bytes, &options).unwrap();
    let (class, code) = main_code(&patched);
    let instructions = decode_stream(&code.code).unwrap();

    assert_eq!(instructions[2].mnemonic, "aload_1");
    let hook = class
        .constant_pool
        .member_ref(instructions[3].constant_index().unwrap())
        .unwrap();
    assert_eq!((hook.owner.as_str(), hook.name.as_str()), ("demo/Hooks", "attach"));

    assert!(matches!(
        inject(&bytes, &options.clone().with_method("start")),
        Err(Error::Patch(PatchError::MethodNotFound(name))) if name == "start"
    ));
}

#[test]
fn rejects_entry_without_construction() {
    let bytes = launcher(|_| simple_code(vec![0x01, 0x4C, 0xB1]));
    assert!(matches!(
        inject(&bytes, &InjectOptions::default()),
        Err(Error::Patch(PatchError::NoConstructionCall))
    ));
}

#[test]
fn rejects_garbage() {
    assert!(matches!(
        inject(b"not a class file", &InjectOptions::default()),
        Err(Error::Malformed { .. })
    ));
}
