//! A miniature Brigadier-style host registered into a bridge [`Runtime`].
//!
//! The grammar knows four commands:
//!
//! ```text
//! give <player:word> <item:word> [<count:int>]
//! say <message:greedy>
//! op <target:word>          (requires permission level 3)
//! ```
//!
//! and the dispatcher raises outright for the input `crash`. Parse results follow
//! Brigadier's conventions closely enough for the validator: exceptions collected while
//! trying the children of the deepest matched node, a reader positioned after the last
//! matched node and its separator, and `validateParseResults` picking between the single
//! collected exception, "Unknown command" and "Incorrect argument for command".

use std::sync::Arc;

use crate::bridge::{
    CallContext, MethodSignature, ObjectHandle, Outcome, Runtime, TypeDef, Value,
};

pub const SERVER: &str = "net.minecraft.server.MinecraftServer";
pub const DEDICATED_SERVER: &str = "net.minecraft.server.dedicated.DedicatedServer";
pub const COMMANDS: &str = "net.minecraft.commands.Commands";
pub const PERMISSION_SOURCE: &str = "net.minecraft.commands.PermissionSource";
pub const DISPATCHER: &str = "com.mojang.brigadier.CommandDispatcher";
pub const PARSE_RESULTS: &str = "com.mojang.brigadier.ParseResults";
pub const CONTEXT_BUILDER: &str = "com.mojang.brigadier.context.CommandContextBuilder";
pub const CONTEXT: &str = "com.mojang.brigadier.context.CommandContext";
pub const CONTEXT_CHAIN: &str = "com.mojang.brigadier.context.ContextChain";
pub const IMMUTABLE_READER: &str = "com.mojang.brigadier.ImmutableStringReader";
pub const READER: &str = "com.mojang.brigadier.StringReader";
pub const SYNTAX_EXCEPTION: &str = "com.mojang.brigadier.exceptions.CommandSyntaxException";
pub const BUILT_IN_EXCEPTIONS: &str = "com.mojang.brigadier.exceptions.BuiltInExceptions";
pub const EXCEPTION_TYPE: &str = "com.mojang.brigadier.exceptions.SimpleCommandExceptionType";
pub const MESSAGE: &str = "com.mojang.brigadier.LiteralMessage";

const UNKNOWN_COMMAND: &str = "Unknown command";
const UNKNOWN_ARGUMENT: &str = "Incorrect argument for command";

enum Parser {
    Word,
    Int,
    Greedy,
}

enum Kind {
    Root,
    Literal(&'static str),
    Argument(Parser),
}

struct Node {
    kind: Kind,
    executable: bool,
    permission: i32,
    children: Vec<Node>,
}

impl Node {
    fn new(kind: Kind) -> Self {
        Node {
            kind,
            executable: false,
            permission: 0,
            children: Vec::new(),
        }
    }

    fn literal(name: &'static str) -> Self {
        Self::new(Kind::Literal(name))
    }

    fn argument(parser: Parser) -> Self {
        Self::new(Kind::Argument(parser))
    }

    fn executes(mut self) -> Self {
        self.executable = true;
        self
    }

    fn requires(mut self, level: i32) -> Self {
        self.permission = level;
        self
    }

    fn then(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    /// End of the match starting at `cursor`: `Ok(None)` when a literal does not match.
    fn try_parse(&self, input: &[char], cursor: usize) -> Result<Option<usize>, String> {
        let word_end = input[cursor..]
            .iter()
            .position(|c| *c == ' ')
            .map_or(input.len(), |offset| cursor + offset);
        let word: String = input[cursor..word_end].iter().collect();

        match &self.kind {
            Kind::Root => Ok(None),
            Kind::Literal(name) => Ok((word == *name).then_some(word_end)),
            Kind::Argument(Parser::Word) if word.is_empty() => Err("Expected word".to_string()),
            Kind::Argument(Parser::Word) => Ok(Some(word_end)),
            Kind::Argument(Parser::Int) => match word.parse::<i32>() {
                Ok(_) => Ok(Some(word_end)),
                Err(_) => Err(format!("Invalid integer '{word}'")),
            },
            Kind::Argument(Parser::Greedy) => Ok(Some(input.len())),
        }
    }
}

fn grammar() -> Node {
    Node::new(Kind::Root)
        .then(
            Node::literal("give").then(
                Node::argument(Parser::Word).then(
                    Node::argument(Parser::Word)
                        .executes()
                        .then(Node::argument(Parser::Int).executes()),
                ),
            ),
        )
        .then(Node::literal("say").then(Node::argument(Parser::Greedy).executes()))
        .then(
            Node::literal("op")
                .requires(3)
                .then(Node::argument(Parser::Word).executes()),
        )
}

struct Server {
    commands: ObjectHandle,
}

struct Commands {
    dispatcher: ObjectHandle,
}

struct Dispatcher {
    root: Node,
}

struct ParseResults {
    input: String,
    cursor: usize,
    matched: bool,
    executable: bool,
    exceptions: Vec<ObjectHandle>,
}

struct ContextBuilder {
    executable: bool,
}

struct Context {
    executable: bool,
}

struct Reader {
    input: String,
    cursor: usize,
}

struct SyntaxException {
    message: String,
    input: Option<String>,
    cursor: i32,
}

struct ExceptionType {
    message: &'static str,
}

pub fn syntax_exception(message: &str, input: Option<&str>, cursor: i32) -> ObjectHandle {
    ObjectHandle::new(
        SYNTAX_EXCEPTION,
        SyntaxException {
            message: message.to_string(),
            input: input.map(str::to_string),
            cursor,
        },
    )
}

fn cursor_i32(cursor: usize) -> i32 {
    i32::try_from(cursor).unwrap_or(i32::MAX)
}

fn allowed(call: &CallContext<'_>, source: &Value, level: i32) -> bool {
    if level == 0 {
        return true;
    }
    let Ok(source) = source.as_object() else {
        return false;
    };
    call.runtime
        .invoke(
            source,
            &MethodSignature::new("hasPermission", ["int"]),
            &[Value::Int(level)],
        )
        .and_then(|granted| granted.as_bool())
        .unwrap_or(false)
}

fn parse(call: &CallContext<'_>) -> Outcome {
    let dispatcher = call.this_as::<Dispatcher>().ok_or_else(|| {
        syntax_exception("Receiver is not a dispatcher", None, -1)
    })?;
    let input = call.arg(0).and_then(|v| v.as_str().ok()).unwrap_or_default();
    let source = call.arg(1).cloned().unwrap_or(Value::Null);
    if input == "crash" {
        return Err(syntax_exception("Dispatcher exploded", None, -1));
    }

    let chars: Vec<char> = input.chars().collect();
    let mut node = &dispatcher.root;
    let mut cursor = 0;
    let mut matched = false;
    let mut exceptions = Vec::new();

    while cursor < chars.len() {
        exceptions.clear();
        let mut next = None;
        for child in &node.children {
            if !allowed(call, &source, child.permission) {
                continue;
            }
            match child.try_parse(&chars, cursor) {
                Ok(Some(end)) => {
                    next = Some((child, end));
                    break;
                }
                Ok(None) => {}
                Err(message) => {
                    exceptions.push(syntax_exception(&message, Some(input), cursor_i32(cursor)))
                }
            }
        }

        let Some((child, end)) = next else {
            break;
        };
        exceptions.clear();
        node = child;
        matched = true;
        cursor = end;
        if cursor < chars.len() {
            cursor += 1;
        }
    }

    Ok(Value::Object(ObjectHandle::new(
        PARSE_RESULTS,
        ParseResults {
            input: input.to_string(),
            cursor,
            matched,
            executable: node.executable,
            exceptions,
        },
    )))
}

fn validate_parse_results(call: &CallContext<'_>) -> Outcome {
    let Some(results) = call
        .arg(0)
        .and_then(|v| v.as_object().ok())
        .and_then(|handle| handle.downcast_ref::<ParseResults>())
    else {
        return Err(syntax_exception("Expected parse results", None, -1));
    };

    if results.cursor >= results.input.chars().count() {
        return Ok(Value::Void);
    }
    if let [single] = results.exceptions.as_slice() {
        return Err(single.clone());
    }
    let message = if results.matched {
        UNKNOWN_ARGUMENT
    } else {
        UNKNOWN_COMMAND
    };
    Err(syntax_exception(
        message,
        Some(&results.input),
        cursor_i32(results.cursor),
    ))
}

fn exception_type(message: &'static str) -> Value {
    Value::Object(ObjectHandle::new(EXCEPTION_TYPE, ExceptionType { message }))
}

/// Owns the runtime and the server object of the mock host.
pub struct MockHost {
    runtime: Arc<Runtime>,
    server: ObjectHandle,
}

impl MockHost {
    pub fn new() -> Self {
        let runtime = Arc::new(Runtime::new());
        register(&runtime);

        let dispatcher = ObjectHandle::new(DISPATCHER, Dispatcher { root: grammar() });
        let commands = ObjectHandle::new(COMMANDS, Commands { dispatcher });
        let server = ObjectHandle::new(DEDICATED_SERVER, Server { commands });
        MockHost { runtime, server }
    }

    pub fn runtime(&self) -> Arc<Runtime> {
        Arc::clone(&self.runtime)
    }

    /// The host root, as the injected hook would receive it.
    pub fn server(&self) -> ObjectHandle {
        self.server.clone()
    }
}

fn register(runtime: &Runtime) {
    runtime.register(TypeDef::class(SERVER).method(
        MethodSignature::nullary("getCommands"),
        |call| {
            call.this_as::<Server>()
                .map(|server| Value::Object(server.commands.clone()))
                .ok_or_else(|| syntax_exception("Not a server", None, -1))
        },
    ));
    runtime.register(TypeDef::class(DEDICATED_SERVER).extends(SERVER));

    runtime.register(
        TypeDef::class(COMMANDS)
            .method(MethodSignature::nullary("getDispatcher"), |call| {
                call.this_as::<Commands>()
                    .map(|commands| Value::Object(commands.dispatcher.clone()))
                    .ok_or_else(|| syntax_exception("Not a command registry", None, -1))
            })
            .static_method(
                MethodSignature::new("validateParseResults", [PARSE_RESULTS]),
                validate_parse_results,
            ),
    );

    runtime.register(
        TypeDef::interface(PERMISSION_SOURCE)
            .abstract_method(MethodSignature::new("hasPermission", ["int"])),
    );

    runtime.register(TypeDef::class(DISPATCHER).method(
        MethodSignature::new("parse", ["java.lang.String", "java.lang.Object"]),
        parse,
    ));

    runtime.register(
        TypeDef::class(PARSE_RESULTS)
            .method(MethodSignature::nullary("getContext"), |call| {
                let results = call.this_as::<ParseResults>();
                Ok(Value::Object(ObjectHandle::new(
                    CONTEXT_BUILDER,
                    ContextBuilder {
                        executable: results.is_some_and(|r| r.executable),
                    },
                )))
            })
            .method(MethodSignature::nullary("getReader"), |call| {
                let results = call
                    .this_as::<ParseResults>()
                    .ok_or_else(|| syntax_exception("Not parse results", None, -1))?;
                Ok(Value::Object(ObjectHandle::new(
                    READER,
                    Reader {
                        input: results.input.clone(),
                        cursor: results.cursor,
                    },
                )))
            }),
    );

    runtime.register(TypeDef::class(CONTEXT_BUILDER).method(
        MethodSignature::new("build", ["java.lang.String"]),
        |call| {
            let executable = call
                .this_as::<ContextBuilder>()
                .is_some_and(|builder| builder.executable);
            Ok(Value::Object(ObjectHandle::new(CONTEXT, Context { executable })))
        },
    ));
    runtime.register(TypeDef::class(CONTEXT));

    runtime.register(TypeDef::class(CONTEXT_CHAIN).static_method(
        MethodSignature::new("tryFlatten", [CONTEXT]),
        |call| {
            let executable = call
                .arg(0)
                .and_then(|v| v.as_object().ok())
                .and_then(|handle| handle.downcast_ref::<Context>())
                .is_some_and(|context| context.executable);
            Ok(if executable {
                Value::Object(ObjectHandle::new(CONTEXT_CHAIN, ()))
            } else {
                Value::Null
            })
        },
    ));

    runtime.register(TypeDef::interface(IMMUTABLE_READER));
    runtime.register(TypeDef::class(READER).extends(IMMUTABLE_READER));

    runtime.register(
        TypeDef::class(SYNTAX_EXCEPTION)
            .extends("java.lang.Exception")
            .static_field(
                "BUILT_IN_EXCEPTIONS",
                ObjectHandle::new(BUILT_IN_EXCEPTIONS, ()),
            )
            .method(MethodSignature::nullary("getRawMessage"), |call| {
                let message = call
                    .this_as::<SyntaxException>()
                    .map_or_else(String::new, |e| e.message.clone());
                Ok(Value::Object(ObjectHandle::new(MESSAGE, message)))
            })
            .method(MethodSignature::nullary("getInput"), |call| {
                Ok(call
                    .this_as::<SyntaxException>()
                    .and_then(|e| e.input.clone())
                    .into())
            })
            .method(MethodSignature::nullary("getCursor"), |call| {
                Ok(Value::Int(
                    call.this_as::<SyntaxException>().map_or(-1, |e| e.cursor),
                ))
            }),
    );

    runtime.register(
        TypeDef::class(BUILT_IN_EXCEPTIONS)
            .method(MethodSignature::nullary("dispatcherUnknownCommand"), |_| {
                Ok(exception_type(UNKNOWN_COMMAND))
            })
            .method(MethodSignature::nullary("dispatcherUnknownArgument"), |_| {
                Ok(exception_type(UNKNOWN_ARGUMENT))
            }),
    );

    runtime.register(TypeDef::class(EXCEPTION_TYPE).method(
        MethodSignature::new("createWithContext", [IMMUTABLE_READER]),
        |call| {
            let message = call
                .this_as::<ExceptionType>()
                .map_or("", |t| t.message);
            let reader = call
                .arg(0)
                .and_then(|v| v.as_object().ok())
                .and_then(|handle| handle.downcast_ref::<Reader>());
            Ok(Value::Object(match reader {
                Some(reader) => {
                    syntax_exception(message, Some(&reader.input), cursor_i32(reader.cursor))
                }
                None => syntax_exception(message, None, -1),
            }))
        },
    ));

    runtime.register(TypeDef::class(MESSAGE).method(
        MethodSignature::nullary("getString"),
        |call| {
            Ok(Value::from(
                call.this_as::<String>().cloned().unwrap_or_default(),
            ))
        },
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::DispatchTable;

    fn parse_with(host: &MockHost, source: ObjectHandle, input: &str) -> ObjectHandle {
        let commands = host
            .runtime
            .invoke(&host.server, &MethodSignature::nullary("getCommands"), &[])
            .unwrap()
            .into_object()
            .unwrap();
        let dispatcher = host
            .runtime
            .invoke(&commands, &MethodSignature::nullary("getDispatcher"), &[])
            .unwrap()
            .into_object()
            .unwrap();
        host.runtime
            .invoke(
                &dispatcher,
                &MethodSignature::new("parse", ["java.lang.String", "java.lang.Object"]),
                &[Value::from(input), Value::Object(source)],
            )
            .unwrap()
            .into_object()
            .unwrap()
    }

    #[test]
    fn test_permission_hides_nodes() {
        let host = MockHost::new();
        let denying = host
            .runtime
            .synthesize(PERMISSION_SOURCE, DispatchTable::constant(Value::Bool(false)))
            .unwrap();
        let granting = host
            .runtime
            .synthesize(PERMISSION_SOURCE, DispatchTable::constant(Value::Bool(true)))
            .unwrap();

        let denied = parse_with(&host, denying, "op Alex");
        assert!(!denied.downcast_ref::<ParseResults>().unwrap().matched);

        let granted = parse_with(&host, granting, "op Alex");
        let results = granted.downcast_ref::<ParseResults>().unwrap();
        assert!(results.matched);
        assert!(results.executable);
        assert_eq!(results.cursor, 7);
    }
}
