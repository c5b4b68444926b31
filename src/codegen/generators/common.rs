//! Builders shared by every generator: on-demand local variables, the
//! callback prologue steps, V8 argument/return marshaling, registration
//! tables grouped by exposure, `WrapperTypeInfo` and overload dispatch.

use std::collections::BTreeMap;
use std::rc::Rc;

use web_idl::{Argument, Database, ExtendedAttributes, IdlType, TypeKind, UnwrapFlags};

use crate::codegen::code_node::{CodeNodeTree, Likeliness, NodeId};
use crate::codegen::cxx;
use crate::codegen::error::GenerationError;
use crate::codegen::exposure::Expr;
use crate::codegen::name_style;
use crate::codegen::type_bridge;

/// Export macro of the component a class is generated into.
pub fn component_export(component: web_idl::Component) -> &'static str {
    match component {
        web_idl::Component::Core => "CORE_EXPORT",
        web_idl::Component::Modules => "MODULES_EXPORT",
    }
}

/// A text node whose `${name}` variables are bound to symbol references, so
/// using the node demands the named locals' definitions.
pub fn text_with_symbols(tree: &mut CodeNodeTree, template: &str, symbols: &[&str]) -> NodeId {
    let node = tree.text(template);
    for symbol in symbols {
        let reference = tree.symbol_ref(*symbol);
        tree.bind(node, symbol, reference);
    }
    node
}

/// Register a symbol whose definition is a template referencing other
/// symbols by `${name}`.
pub fn register_local_symbol(
    tree: &mut CodeNodeTree,
    scope: NodeId,
    name: &str,
    definition: impl Into<String>,
    deps: &[&str],
) {
    let definition = definition.into();
    let deps: Vec<String> = deps.iter().map(|d| d.to_string()).collect();
    tree.register_code_symbol(
        scope,
        name,
        Rc::new(move |t: &mut CodeNodeTree| {
            let node = t.text(&definition);
            for dep in &deps {
                let reference = t.symbol_ref(dep);
                t.bind(node, dep, reference);
            }
            node
        }),
    );
}

/// The standard locals available on demand in every generated V8 callback.
///
/// Nothing is emitted up front; a definition materializes only when some
/// statement references the symbol.
pub fn bind_callback_local_vars(
    tree: &mut CodeNodeTree,
    scope: NodeId,
    class_name: &str,
    property_name: &str,
    exception_context: &str,
) {
    let v8_class = format!("V8{class_name}");
    bind_callback_local_vars_with_receiver(
        tree,
        scope,
        &v8_class,
        class_name,
        class_name,
        property_name,
        exception_context,
    );
}

/// [`bind_callback_local_vars`] for callbacks whose receiver class is not
/// simply `V8` + the IDL name (iterators, observable arrays).
pub fn bind_callback_local_vars_with_receiver(
    tree: &mut CodeNodeTree,
    scope: NodeId,
    v8_class: &str,
    blink_class: &str,
    idl_name: &str,
    property_name: &str,
    exception_context: &str,
) {
    register_local_symbol(
        tree,
        scope,
        "isolate",
        "v8::Isolate* isolate = info.GetIsolate();\n",
        &[],
    );
    register_local_symbol(
        tree,
        scope,
        "current_context",
        "v8::Local<v8::Context> current_context = ${isolate}->GetCurrentContext();\n",
        &["isolate"],
    );
    register_local_symbol(
        tree,
        scope,
        "script_state",
        "ScriptState* script_state = ScriptState::From(${isolate}, ${current_context});\n",
        &["isolate", "current_context"],
    );
    register_local_symbol(
        tree,
        scope,
        "execution_context",
        "ExecutionContext* execution_context = ExecutionContext::From(${script_state});\n",
        &["script_state"],
    );
    register_local_symbol(
        tree,
        scope,
        "v8_receiver",
        "v8::Local<v8::Object> v8_receiver = info.This();\n",
        &[],
    );
    register_local_symbol(
        tree,
        scope,
        "blink_receiver",
        format!(
            "{blink_class}* blink_receiver = \
             {v8_class}::ToWrappableUnsafe(${{isolate}}, ${{v8_receiver}});\n"
        ),
        &["isolate", "v8_receiver"],
    );
    register_local_symbol(
        tree,
        scope,
        "exception_state",
        format!(
            "ExceptionState exception_state(${{isolate}}, \
             v8::ExceptionContext::k{exception_context}, \
             \"{idl_name}\", \"{property_name}\");\n"
        ),
        &["isolate"],
    );

    // Text anywhere in the callback body may spell these as `${name}`.
    let local_vars = [
        "isolate",
        "current_context",
        "script_state",
        "execution_context",
        "v8_receiver",
        "blink_receiver",
        "exception_state",
    ];
    for var in local_vars {
        let reference = tree.symbol_ref(var);
        tree.bind_base(scope, var, reference);
    }
}

fn global_object_predicate(global_name: &str) -> String {
    if global_name == "Window" {
        "IsWindow()".to_string()
    } else {
        format!("Is{global_name}GlobalScope()")
    }
}

/// The locals an installer body may demand, plus base bindings for the
/// `${...}` variables exposure atoms reference.
///
/// `script_state` and `feature_selector` are installer parameters; the rest
/// are on-demand locals derived from them.
pub fn bind_installer_local_vars(tree: &mut CodeNodeTree, scope: NodeId, global_names: &[String]) {
    register_local_symbol(
        tree,
        scope,
        "execution_context",
        "ExecutionContext* execution_context = ExecutionContext::From(script_state);\n",
        &[],
    );
    let context_flags = [
        ("is_in_secure_context", "IsSecureContext()"),
        ("is_cross_origin_isolated", "CrossOriginIsolatedCapability()"),
        ("is_in_isolated_context", "IsIsolatedContext()"),
        ("is_injection_mitigated", "IsInjectionMitigatedContext()"),
    ];
    for (symbol, predicate) in context_flags {
        register_local_symbol(
            tree,
            scope,
            symbol,
            format!("const bool {symbol} = ${{execution_context}}->{predicate};\n"),
            &["execution_context"],
        );
    }
    for global_name in global_names {
        let symbol = format!("is_global_{}", name_style::snake_case(global_name));
        let predicate = global_object_predicate(global_name);
        register_local_symbol(
            tree,
            scope,
            &symbol,
            format!("const bool {symbol} = ${{execution_context}}->{predicate};\n"),
            &["execution_context"],
        );
    }

    // Exposure atoms spell these as template variables; route each to the
    // on-demand symbol (or parameter) of the same name.
    let symbol_vars = [
        "execution_context",
        "is_in_secure_context",
        "is_cross_origin_isolated",
        "is_in_isolated_context",
        "is_injection_mitigated",
    ];
    for var in symbol_vars {
        let reference = tree.symbol_ref(var);
        tree.bind_base(scope, var, reference);
    }
    for global_name in global_names {
        let var = format!("is_global_{}", name_style::snake_case(global_name));
        let reference = tree.symbol_ref(&var);
        tree.bind_base(scope, &var, reference);
    }
    tree.bind_base(scope, "feature_selector", "feature_selector");
}

/// Everything the fixed-order callback prologue needs to know.
pub struct PrologueSpec<'a> {
    pub class_name: &'a str,
    pub property_name: &'a str,
    pub ext_attrs: &'a ExtendedAttributes,
    /// Minimum argument count to enforce, when >0.
    pub num_required_args: usize,
    /// Suffix distinguishing use-counter names (`_Getter`, `_Setter`,
    /// `_Method`, `_Constructor`).
    pub counter_suffix: &'a str,
}

/// Build the prologue statements in their fixed order. Omitted steps cost
/// nothing.
pub fn make_prologue(tree: &mut CodeNodeTree, spec: &PrologueSpec<'_>) -> Vec<NodeId> {
    let mut steps: Vec<NodeId> = Vec::new();
    let class_name = spec.class_name;
    let property_name = spec.property_name;

    if spec.ext_attrs.value_of("CheckSecurity") == Some("Receiver") {
        let check = text_with_symbols(
            tree,
            "if (!BindingSecurity::ShouldAllowAccessTo(\
             ToLocalDOMWindow(${current_context}), ${blink_receiver})) [[unlikely]] {\n\
             \x20 ${exception_state}.ThrowSecurityError(\
             BindingSecurity::ErrorMessageForAccessDenied());\n\
             \x20 return;\n\
             }\n",
            &["current_context", "blink_receiver", "exception_state"],
        );
        steps.push(check);
    }

    let timer = match spec.ext_attrs.value_of("RuntimeCallStatsCounter") {
        Some(counter) => text_with_symbols(
            tree,
            &format!(
                "RUNTIME_CALL_TIMER_SCOPE(${{isolate}}, \
                 RuntimeCallStats::CounterId::k{counter});\n"
            ),
            &["isolate"],
        ),
        None => text_with_symbols(
            tree,
            &format!(
                "RUNTIME_CALL_TIMER_SCOPE_DISABLED_BY_DEFAULT(${{isolate}}, \
                 \"Blink_{class_name}_{property_name}\");\n"
            ),
            &["isolate"],
        ),
    };
    steps.push(timer);

    steps.push(tree.literal(format!("BINDINGS_TRACE_EVENT(\"{class_name}.{property_name}\");\n")));

    if let Some(feature) = spec.ext_attrs.value_of("DeprecateAs") {
        let report = text_with_symbols(
            tree,
            &format!(
                "Deprecation::CountDeprecation(${{execution_context}}, \
                 WebFeature::k{feature});\n"
            ),
            &["execution_context"],
        );
        steps.push(report);
    }

    if spec.ext_attrs.has("HighEntropy") {
        let feature = measure_as_feature(spec);
        let report = text_with_symbols(
            tree,
            &format!(
                "Dactyloscoper::RecordDirectSurface(${{execution_context}}, \
                 WebFeature::k{feature}, info);\n"
            ),
            &["execution_context"],
        );
        steps.push(report);
    }

    if spec.ext_attrs.has("Measure") || spec.ext_attrs.has("MeasureAs") {
        let feature = measure_as_feature(spec);
        let report = text_with_symbols(
            tree,
            &format!("UseCounter::Count(${{execution_context}}, WebFeature::k{feature});\n"),
            &["execution_context"],
        );
        steps.push(report);
    }

    if spec.ext_attrs.has("LogActivity") {
        let log = text_with_symbols(
            tree,
            &format!(
                "if (V8DOMActivityLogger* activity_logger = \
                 V8DOMActivityLogger::CurrentActivityLoggerIfIsolatedWorld(${{isolate}})) \
                 [[unlikely]] {{\n\
                 \x20 activity_logger->LogMethod(\"{class_name}.{property_name}\", info);\n\
                 }}\n"
            ),
            &["isolate"],
        );
        steps.push(log);
    }

    if spec.num_required_args > 0 {
        let n = spec.num_required_args;
        let check = text_with_symbols(
            tree,
            &format!(
                "if (info.Length() < {n}) [[unlikely]] {{\n\
                 \x20 ${{exception_state}}.ThrowTypeError(\
                 ExceptionMessages::NotEnoughArguments({n}, info.Length()));\n\
                 \x20 return;\n\
                 }}\n"
            ),
            &["exception_state"],
        );
        steps.push(check);
    }

    if spec.ext_attrs.has("CEReactions") {
        steps.push(tree.literal("CEReactionsScope ce_reactions_scope;\n"));
    }

    steps
}

fn measure_as_feature(spec: &PrologueSpec<'_>) -> String {
    match spec.ext_attrs.value_of("MeasureAs") {
        Some(feature) => feature.to_string(),
        None => format!(
            "V8{}_{}{}",
            spec.class_name,
            name_style::upper_camel_case(spec.property_name),
            spec.counter_suffix
        ),
    }
}

/// C++ name of the local holding argument `index`.
pub fn argument_var_name(arg: &Argument) -> String {
    format!("arg{}_{}", arg.index, name_style::arg(&arg.identifier))
}

/// Convert `info[i]` into the argument's native local, with the early
/// exception exit. Handles optional arguments with and without defaults and
/// variadic tails.
pub fn make_v8_to_blink_argument(
    tree: &mut CodeNodeTree,
    db: &Database,
    arg: &Argument,
) -> Result<NodeId, GenerationError> {
    let var = argument_var_name(arg);
    let index = arg.index;
    let exception_exit = "if (${exception_state}.HadException()) [[unlikely]] {\n  return;\n}\n";

    if arg.is_variadic() {
        let element = arg
            .idl_type
            .element_type()
            .ok_or_else(|| GenerationError::invariant("variadic without element type", "<argument>"))?;
        let tag = type_bridge::native_value_tag(db, element)?;
        let node = text_with_symbols(
            tree,
            &format!(
                "auto&& {var} = bindings::VariadicArgumentsToNativeValues<{tag}>(\
                 ${{isolate}}, info, {index}, ${{exception_state}});\n{exception_exit}"
            ),
            &["isolate", "exception_state"],
        );
        return Ok(node);
    }

    if let Some(default) = &arg.default_value {
        let tag = type_bridge::native_value_tag(db, &arg.idl_type)?;
        let default_expr = type_bridge::make_default_value_expr(db, &arg.idl_type, default)?;
        let info = type_bridge::blink_type_info(db, &arg.idl_type)?;
        let mut deps = vec!["isolate", "exception_state"];
        deps.extend(default_expr.deps.iter().copied());
        deps.sort_unstable();
        deps.dedup();
        let node = text_with_symbols(
            tree,
            &format!(
                "{value_t} {var};\n\
                 if (info[{index}]->IsUndefined()) {{\n\
                 \x20 {var} = {default};\n\
                 }} else {{\n\
                 \x20 {var} = NativeValueTraits<{tag}>::NativeValue(\
                 ${{isolate}}, info[{index}], ${{exception_state}});\n\
                 \x20 {exception_exit_indented}\
                 }}\n",
                value_t = info.value_t,
                default = default_expr.assignment_expr,
                exception_exit_indented =
                    "if (${exception_state}.HadException()) [[unlikely]] {\n    return;\n  }\n",
            ),
            &deps,
        );
        return Ok(node);
    }

    let tag = if arg.is_optional {
        format!("IDLOptional<{}>", type_bridge::native_value_tag(db, &arg.idl_type)?)
    } else {
        type_bridge::native_value_tag(db, &arg.idl_type)?
    };
    let node = text_with_symbols(
        tree,
        &format!(
            "auto&& {var} = NativeValueTraits<{tag}>::NativeValue(\
             ${{isolate}}, info[{index}], ${{exception_state}});\n{exception_exit}"
        ),
        &["isolate", "exception_state"],
    );
    Ok(node)
}

/// `bindings::V8SetReturnValue(info, ...)` in the flavor the return type
/// requires. `Ok(None)` for `undefined` returns.
pub fn make_v8_set_return_value(
    tree: &mut CodeNodeTree,
    db: &Database,
    return_type: &IdlType,
    value_expr: &str,
) -> Result<Option<NodeId>, GenerationError> {
    let unwrapped = return_type.unwrap(db, UnwrapFlags::typedefs_only());
    if unwrapped.is_undefined() {
        return Ok(None);
    }
    let node = if unwrapped.is_boolean() || unwrapped.is_numeric() {
        tree.literal(format!("bindings::V8SetReturnValue(info, {value_expr});\n"))
    } else if unwrapped.is_string() || unwrapped.is_enumeration(db) {
        text_with_symbols(
            tree,
            &format!("bindings::V8SetReturnValue(info, {value_expr}, ${{isolate}});\n"),
            &["isolate"],
        )
    } else if unwrapped.is_interface(db) {
        text_with_symbols(
            tree,
            &format!(
                "bindings::V8SetReturnValue(info, {value_expr}, ${{blink_receiver}}, \
                 bindings::V8ReturnValue::kMaybeWrapped);\n"
            ),
            &["blink_receiver"],
        )
    } else {
        let tag = type_bridge::native_value_tag(db, return_type)?;
        text_with_symbols(
            tree,
            &format!(
                "bindings::V8SetReturnValue(info, \
                 ToV8Traits<{tag}>::ToV8(${{script_state}}, {value_expr}));\n"
            ),
            &["script_state"],
        )
    };
    Ok(Some(node))
}

/// One row destined for a registration table.
pub struct InstallEntry {
    pub exposure: Expr,
    pub entry_text: String,
}

/// The fixed shape of one kind of registration table.
pub struct TableSpec<'a> {
    /// Row type, e.g. `bindings::AttributeConfig`.
    pub entry_type: &'a str,
    /// Base name of the table variable, e.g. `kAttributeTable`.
    pub table_var: &'a str,
    /// Install call; `{table}` is replaced with the table variable name.
    pub install_call: &'a str,
}

/// Emit registration tables grouped by exposure expression.
///
/// Unconditional entries form one table installed unguarded; every distinct
/// conditional expression gets its own guarded table, in first-appearance
/// order. Always-false entries are silently dropped.
pub fn install_entries_grouped(
    tree: &mut CodeNodeTree,
    body: NodeId,
    spec: &TableSpec<'_>,
    entries: Vec<InstallEntry>,
) {
    let mut groups: Vec<(String, Expr, Vec<String>)> = Vec::new();
    for entry in entries {
        if entry.exposure.is_always_false() {
            continue;
        }
        let key = entry.exposure.to_text();
        match groups.iter_mut().find(|(k, _, _)| *k == key) {
            Some((_, _, rows)) => rows.push(entry.entry_text),
            None => groups.push((key, entry.exposure, vec![entry.entry_text])),
        }
    }

    let mut conditional_index = 0usize;
    for (_, exposure, rows) in groups {
        let table_var = if exposure.is_always_true() {
            spec.table_var.to_string()
        } else {
            conditional_index += 1;
            format!("{}{}", spec.table_var, conditional_index)
        };
        let mut table = format!("static const {} {}[] = {{\n", spec.entry_type, table_var);
        for row in &rows {
            table.push_str(&format!("    {row},\n"));
        }
        table.push_str("};\n");
        let install = spec.install_call.replace("{table}", &table_var);
        let block_text = format!("{table}{install}\n");
        if exposure.is_always_true() {
            let node = tree.text(block_text);
            tree.append(body, node);
        } else {
            let statements = tree.text(block_text);
            let guarded =
                cxx::if_(tree, cxx::Cond::Expr(exposure), vec![statements], Likeliness::Likely);
            tree.append(body, guarded);
        }
    }
}

/// Which IDL definition kind a `WrapperTypeInfo` describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdlDefinitionKind {
    Interface,
    Namespace,
    CallbackInterface,
    Iterator,
    ObservableArray,
}

impl IdlDefinitionKind {
    fn as_token(self) -> &'static str {
        match self {
            IdlDefinitionKind::Interface => "kIdlInterface",
            IdlDefinitionKind::Namespace => "kIdlNamespace",
            IdlDefinitionKind::CallbackInterface => "kIdlCallbackInterface",
            IdlDefinitionKind::Iterator => "kIdlIterator",
            IdlDefinitionKind::ObservableArray => "kIdlObservableArray",
        }
    }
}

pub struct WrapperTypeInfoSpec<'a> {
    /// Bindings class, e.g. `V8Node`.
    pub class_name: &'a str,
    pub idl_name: &'a str,
    /// Parent info accessor, e.g. `V8EventTarget::GetWrapperTypeInfo()`.
    pub parent: Option<&'a str>,
    pub kind: IdlDefinitionKind,
    /// `kNoPrototype` for namespaces and the named-properties object.
    pub has_prototype: bool,
    /// `kNodeClassId` wrapper slot layout for `Node` descendants.
    pub is_node: bool,
    pub is_active_script_wrappable: bool,
    pub has_context_dependent_properties: bool,
    /// The anonymous named-properties object is skipped when walking the
    /// interface-object prototype chain.
    pub skipped_in_interface_object_prototype_chain: bool,
}

/// Header-side declarations for the `WrapperTypeInfo` singleton.
pub fn wrapper_type_info_decls(tree: &mut CodeNodeTree) -> NodeId {
    tree.literal(
        "  static const WrapperTypeInfo* GetWrapperTypeInfo() {\n\
         \x20   return &wrapper_type_info_;\n\
         \x20 }\n\
         \x20 static const WrapperTypeInfo wrapper_type_info_;\n",
    )
}

/// Source-side definition of the `WrapperTypeInfo` singleton.
pub fn wrapper_type_info_def(tree: &mut CodeNodeTree, spec: &WrapperTypeInfoSpec<'_>) -> NodeId {
    let class_name = spec.class_name;
    let install_context_dependent = if spec.has_context_dependent_properties {
        format!("{class_name}::InstallContextDependentProperties")
    } else {
        "nullptr".to_string()
    };
    let parent = spec.parent.unwrap_or("nullptr");
    let prototype = if spec.has_prototype {
        "WrapperTypeInfo::kWrapperTypeObjectPrototype"
    } else {
        "WrapperTypeInfo::kWrapperTypeNoPrototype"
    };
    let class_id = if spec.is_node {
        "WrapperTypeInfo::kNodeClassId"
    } else {
        "WrapperTypeInfo::kObjectClassId"
    };
    let active = if spec.is_active_script_wrappable {
        "WrapperTypeInfo::kInheritFromActiveScriptWrappable"
    } else {
        "WrapperTypeInfo::kNotInheritFromActiveScriptWrappable"
    };
    let skipped = if spec.skipped_in_interface_object_prototype_chain {
        "WrapperTypeInfo::kSkippedInInterfaceObjectPrototypeChain"
    } else {
        "WrapperTypeInfo::kNotSkippedInInterfaceObjectPrototypeChain"
    };
    tree.literal(format!(
        "const WrapperTypeInfo {class_name}::wrapper_type_info_{{\n\
         \x20   gin::kEmbedderBlink,\n\
         \x20   {class_name}::InstallInterfaceTemplate,\n\
         \x20   {install_context_dependent},\n\
         \x20   \"{idl_name}\",\n\
         \x20   {parent},\n\
         \x20   {prototype},\n\
         \x20   {class_id},\n\
         \x20   {active},\n\
         \x20   WrapperTypeInfo::{kind},\n\
         \x20   {skipped},\n\
         }};\n",
        idl_name = spec.idl_name,
        kind = spec.kind.as_token(),
    ))
}

/// One overload target of a dispatcher.
pub struct OverloadTarget<'a> {
    pub callback_name: String,
    pub arguments: &'a [Argument],
}

impl OverloadTarget<'_> {
    fn num_required(&self) -> usize {
        self.arguments.iter().filter(|a| !a.is_optional && !a.is_variadic()).count()
    }

    fn accepts_count(&self, count: usize) -> bool {
        let has_variadic = self.arguments.iter().any(Argument::is_variadic);
        count >= self.num_required()
            && (has_variadic || count <= self.arguments.len())
    }
}

/// Priority order of the distinguishing type tests. Lower runs first.
fn type_test(db: &Database, idl_type: &IdlType, index: usize) -> (u8, Option<String>) {
    let unwrapped = idl_type.unwrap(db, UnwrapFlags::typedefs_only());
    let arg = format!("info[{index}]");
    if unwrapped.is_nullable() || unwrapped.is_dictionary(db) {
        return (1, Some(format!("{arg}->IsNullOrUndefined()")));
    }
    if let Some(identifier) = unwrapped.identifier() {
        if db.find_interface(identifier).is_some() {
            return (2, Some(format!("V8{identifier}::HasInstance(${{isolate}}, {arg})")));
        }
    }
    if let TypeKind::BufferSource { kind, .. } = &unwrapped.kind {
        return if *kind == web_idl::BufferSourceKind::ArrayBuffer {
            (3, Some(format!("{arg}->IsArrayBuffer() || {arg}->IsSharedArrayBuffer()")))
        } else if *kind == web_idl::BufferSourceKind::ArrayBufferView {
            (3, Some(format!("{arg}->IsArrayBufferView()")))
        } else {
            (4, Some(format!("{arg}->Is{}()", kind.as_str())))
        };
    }
    if unwrapped.is_callback_function(db) {
        return (5, Some(format!("{arg}->IsFunction()")));
    }
    if unwrapped.is_sequence() || unwrapped.is_frozen_array() {
        return (6, Some(format!("{arg}->IsArray()")));
    }
    if unwrapped.is_callback_interface(db) || unwrapped.is_record() || unwrapped.is_object() {
        return (7, Some(format!("{arg}->IsObject()")));
    }
    if unwrapped.is_boolean() {
        return (8, Some(format!("{arg}->IsBoolean()")));
    }
    if unwrapped.is_numeric() || unwrapped.is_bigint() {
        return (9, Some(format!("{arg}->IsNumber()")));
    }
    // Terminal fallback: string-likes, enumerations and `any` accept
    // everything through coercion.
    (10, None)
}

/// Build the overload dispatcher: a switch on the argument count, per-count
/// type tests in the fixed priority order, and a terminal
/// "overload resolution failed" TypeError.
pub fn make_overload_dispatcher(
    tree: &mut CodeNodeTree,
    db: &Database,
    targets: &[OverloadTarget<'_>],
) -> Result<NodeId, GenerationError> {
    let max_args = targets.iter().map(|t| t.arguments.len()).max().unwrap_or(0);
    let has_variadic =
        targets.iter().any(|t| t.arguments.iter().any(Argument::is_variadic));

    let count_expr = if has_variadic {
        format!("std::min(info.Length(), {max_args})")
    } else {
        "info.Length()".to_string()
    };
    let switch = cxx::switch(tree, count_expr);

    for count in 0..=max_args {
        let applicable: Vec<&OverloadTarget<'_>> =
            targets.iter().filter(|t| t.accepts_count(count)).collect();
        if applicable.is_empty() {
            continue;
        }
        let body = if applicable.len() == 1 {
            let call =
                tree.literal(format!("{}(info);\nreturn;\n", applicable[0].callback_name));
            vec![call]
        } else {
            let index = distinguishing_index(db, &applicable, count);
            let mut tested: Vec<(u8, u8, usize, cxx::Cond, String)> = Vec::new();
            for (order, target) in applicable.iter().enumerate() {
                let (priority, cond) = match target.arguments.get(index) {
                    Some(arg) => type_test(db, &arg.idl_type, index),
                    None => (0, Some(format!("info[{index}]->IsUndefined()"))),
                };
                let depth_rank = match target.arguments.get(index) {
                    Some(arg) => interface_depth_rank(db, &arg.idl_type),
                    None => 0,
                };
                let cond = match cond {
                    Some(text) => cxx::Cond::text(text),
                    None => cxx::Cond::Expr(Expr::True),
                };
                tested.push((priority, depth_rank, order, cond, target.callback_name.clone()));
            }
            tested.sort_by(|a, b| (a.0, a.1, a.2).cmp(&(b.0, b.1, b.2)));
            let mut branches: Vec<(cxx::Cond, Vec<NodeId>, Likeliness)> = Vec::new();
            for (_, _, _, cond, callback) in tested {
                let call = tree.literal(format!("{callback}(info);\nreturn;\n"));
                branches.push((cond, vec![call], Likeliness::Likely));
            }
            let chain = cxx::multi_branches(tree, branches);
            vec![chain]
        };
        switch.append_case(tree, &count.to_string(), body, true);
    }

    let failure = text_with_symbols(
        tree,
        "${exception_state}.ThrowTypeError(\"Overload resolution failed.\");\nreturn;\n",
        &["exception_state"],
    );
    Ok(tree.sequence(vec![switch.node, failure]))
}

/// Tie-break among same-priority tests: a platform-object test for a more
/// derived interface must run before its bases, or the base's `HasInstance`
/// swallows every derived argument.
fn interface_depth_rank(db: &Database, idl_type: &IdlType) -> u8 {
    let unwrapped = idl_type.unwrap(db, UnwrapFlags::typedefs_only());
    unwrapped
        .identifier()
        .and_then(|identifier| db.find_interface(identifier))
        .map(|interface| {
            let depth = interface.inheritance_depth(db) as u8;
            20u8.saturating_sub(depth.min(18))
        })
        .unwrap_or(0)
}

/// First argument index at which the applicable overloads' types differ.
fn distinguishing_index(
    db: &Database,
    targets: &[&OverloadTarget<'_>],
    count: usize,
) -> usize {
    for index in 0..count {
        let mut seen: BTreeMap<String, usize> = BTreeMap::new();
        for target in targets {
            let key = target
                .arguments
                .get(index)
                .map(|a| a.idl_type.union_token(db))
                .unwrap_or_default();
            *seen.entry(key).or_insert(0) += 1;
        }
        if seen.len() > 1 {
            return index;
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::renderer::render;
    use web_idl::{IntegerKind, StringKind};

    fn arg(identifier: &str, kind: TypeKind, index: usize) -> Argument {
        Argument {
            identifier: identifier.to_string(),
            idl_type: IdlType::new(kind),
            index,
            is_optional: false,
            default_value: None,
        }
    }

    #[test]
    fn callback_local_vars_materialize_on_demand() {
        let mut tree = CodeNodeTree::new();
        let use_ = text_with_symbols(&mut tree, "Use(${script_state});\n", &["script_state"]);
        let scope = tree.symbol_scope(vec![use_], Likeliness::Always);
        bind_callback_local_vars(&mut tree, scope, "Node", "nodeValue", "AttributeGet");
        let text = render(&mut tree, scope).unwrap();
        // Transitive dependencies come first, in dependency order.
        let isolate_at = text.find("v8::Isolate* isolate = info.GetIsolate();").unwrap();
        let context_at = text.find("current_context = isolate->GetCurrentContext()").unwrap();
        let state_at = text
            .find("ScriptState* script_state = ScriptState::From(isolate, current_context);")
            .unwrap();
        let use_at = text.find("Use(script_state);").unwrap();
        assert!(isolate_at < context_at && context_at < state_at && state_at < use_at);
        // Nothing unrequested is emitted.
        assert!(!text.contains("blink_receiver"));
        assert!(!text.contains("ExceptionState"));
    }

    #[test]
    fn grouped_tables_split_by_exposure() {
        let mut tree = CodeNodeTree::new();
        let body = tree.symbol_scope(vec![], Likeliness::Always);
        bind_installer_local_vars(&mut tree, body, &[]);
        install_entries_grouped(
            &mut tree,
            body,
            &TableSpec {
                entry_type: "bindings::AttributeConfig",
                table_var: "kAttributeTable",
                install_call: "bindings::InstallAttributes(isolate, world, instance_template, \
                               prototype_template, {table});",
            },
            vec![
                InstallEntry {
                    exposure: Expr::True,
                    entry_text: "{\"a\", AGet, ASet}".to_string(),
                },
                InstallEntry {
                    exposure: Expr::atom("${is_in_secure_context}"),
                    entry_text: "{\"b\", BGet, BSet}".to_string(),
                },
                InstallEntry {
                    exposure: Expr::True,
                    entry_text: "{\"c\", CGet, CSet}".to_string(),
                },
                InstallEntry {
                    exposure: Expr::False,
                    entry_text: "{\"dead\", DGet, DSet}".to_string(),
                },
            ],
        );
        let text = render(&mut tree, body).unwrap();
        assert!(text.contains("static const bindings::AttributeConfig kAttributeTable[] = {"));
        assert!(text.contains("{\"a\", AGet, ASet},\n    {\"c\", CGet, CSet},"));
        assert!(text.contains("if (is_in_secure_context) {"));
        assert!(text.contains("kAttributeTable1"));
        assert!(text.contains("const bool is_in_secure_context = execution_context->IsSecureContext();"));
        assert!(!text.contains("dead"));
    }

    #[test]
    fn overload_dispatcher_switches_on_count_and_type() {
        let mut db = Database::default();
        db.add_interface(web_idl::Interface {
            identifier: "Node".to_string(),
            inherited: None,
            is_mixin: false,
            attributes: vec![],
            constants: vec![],
            constructor_groups: vec![],
            legacy_factory_function_groups: vec![],
            operation_groups: vec![],
            stringifier: None,
            indexed_and_named_properties: None,
            iterable: None,
            maplike: None,
            setlike: None,
            async_iterable: None,
            exposed_constructs: vec![],
            legacy_window_aliases: vec![],
            ext_attrs: Default::default(),
            exposure: Default::default(),
            code_generator_info: Default::default(),
            debug_info: Default::default(),
        });
        let string_args = [arg("text", TypeKind::String(StringKind::DomString), 0)];
        let node_args = [arg("node", TypeKind::Reference("Node".to_string()), 0)];
        let targets = [
            OverloadTarget { callback_name: "FOverload1Callback".to_string(), arguments: &string_args },
            OverloadTarget { callback_name: "FOverload2Callback".to_string(), arguments: &node_args },
        ];
        let mut tree = CodeNodeTree::new();
        let dispatcher = make_overload_dispatcher(&mut tree, &db, &targets).unwrap();
        let scope = tree.symbol_scope(vec![dispatcher], Likeliness::Always);
        bind_callback_local_vars(&mut tree, scope, "X", "f", "Operation");
        let text = render(&mut tree, scope).unwrap();
        // Platform-object test precedes the terminal string fallback.
        let node_test = text.find("V8Node::HasInstance(isolate, info[0])").unwrap();
        let string_call = text.find("FOverload1Callback(info);").unwrap();
        assert!(node_test < string_call);
        assert!(text.contains("switch (info.Length()) {"));
        assert!(text.contains("ThrowTypeError(\"Overload resolution failed.\")"));
    }

    #[test]
    fn overload_dispatcher_tests_most_derived_interface_first() {
        let iface = |identifier: &str, inherited: Option<&str>| web_idl::Interface {
            identifier: identifier.to_string(),
            inherited: inherited.map(str::to_string),
            is_mixin: false,
            attributes: vec![],
            constants: vec![],
            constructor_groups: vec![],
            legacy_factory_function_groups: vec![],
            operation_groups: vec![],
            stringifier: None,
            indexed_and_named_properties: None,
            iterable: None,
            maplike: None,
            setlike: None,
            async_iterable: None,
            exposed_constructs: vec![],
            legacy_window_aliases: vec![],
            ext_attrs: Default::default(),
            exposure: Default::default(),
            code_generator_info: Default::default(),
            debug_info: Default::default(),
        };
        let mut db = Database::default();
        db.add_interface(iface("Node", None));
        db.add_interface(iface("Element", Some("Node")));
        let node_args = [arg("node", TypeKind::Reference("Node".to_string()), 0)];
        let element_args = [arg("element", TypeKind::Reference("Element".to_string()), 0)];
        // Declaration order puts the base first; the dispatcher must not.
        let targets = [
            OverloadTarget {
                callback_name: "FOverload1Callback".to_string(),
                arguments: &node_args,
            },
            OverloadTarget {
                callback_name: "FOverload2Callback".to_string(),
                arguments: &element_args,
            },
        ];
        let mut tree = CodeNodeTree::new();
        let dispatcher = make_overload_dispatcher(&mut tree, &db, &targets).unwrap();
        let scope = tree.symbol_scope(vec![dispatcher], Likeliness::Always);
        bind_callback_local_vars(&mut tree, scope, "X", "f", "Operation");
        let text = render(&mut tree, scope).unwrap();
        let element_test = text.find("V8Element::HasInstance(isolate, info[0])").unwrap();
        let node_test = text.find("V8Node::HasInstance(isolate, info[0])").unwrap();
        assert!(element_test < node_test);
    }

    #[test]
    fn required_argument_conversion_checks_exceptions() {
        let db = Database::default();
        let argument = arg("count", TypeKind::Integer(IntegerKind::Long), 0);
        let mut tree = CodeNodeTree::new();
        let node = make_v8_to_blink_argument(&mut tree, &db, &argument).unwrap();
        let scope = tree.symbol_scope(vec![node], Likeliness::Always);
        bind_callback_local_vars(&mut tree, scope, "X", "f", "Operation");
        let text = render(&mut tree, scope).unwrap();
        assert!(text.contains(
            "auto&& arg0_count = NativeValueTraits<IDLLong>::NativeValue(isolate, info[0], exception_state);"
        ));
        assert!(text.contains("if (exception_state.HadException()) [[unlikely]] {"));
    }
}
