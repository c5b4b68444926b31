//! Interface bindings.
//!
//! The heaviest generator: per-member callbacks, overload dispatch, the
//! interceptor callbacks of legacy platform objects, cross-origin property
//! tables, and the installer quartet. Member installation is split three
//! ways: unconditional entries go into the interface template, entries
//! guarded by a context-free condition install right after them, and
//! context-dependent entries wait for a `ScriptState`.
//!
//! An interface whose partial lives in a higher component routes its
//! context-dependent installer through a function pointer that the higher
//! component fills in via `V8Foo::Impl::Init()`.

use web_idl::{
    Argument, Attribute, ConstructorGroup, Database, ExtendedAttributes, IdlType, Interface,
    IntegerKind, IteratorKind, Operation, OperationGroup, TypeKind, UnwrapFlags,
};

use crate::codegen::accumulator::include;
use crate::codegen::code_node::{CodeNodeTree, Likeliness, NodeId};
use crate::codegen::cxx::{self, Cond, FuncQuals};
use crate::codegen::error::GenerationError;
use crate::codegen::exposure::{expr_from_exposure, Expr};
use crate::codegen::generators::{common, render_pair, GeneratedFile};
use crate::codegen::name_style;
use crate::codegen::package_initializer::RuntimeEnv;
use crate::codegen::path_manager::TargetPaths;
use crate::codegen::renderer;
use crate::codegen::source_file;
use crate::codegen::type_bridge;

pub fn generate_interface(
    env: &RuntimeEnv,
    identifier: &str,
) -> Result<Vec<GeneratedFile>, GenerationError> {
    let interface = env.database.find_interface(identifier).ok_or_else(|| {
        GenerationError::invariant(format!("no interface `{identifier}`"), "<database>")
    })?;
    // Mixins are folded into their includers by the frontend.
    if interface.is_mixin {
        return Ok(Vec::new());
    }

    let ctx = Ctx {
        env,
        interface,
        class_name: format!("V8{}", interface.identifier),
        blink_class: interface
            .code_generator_info
            .receiver_implemented_as
            .clone()
            .unwrap_or_else(|| interface.identifier.clone()),
        target: TargetPaths::bindings(&interface.identifier, &interface.code_generator_info),
    };
    let cross_component = ctx.target.is_cross_component();

    let mut source_tree = CodeNodeTree::new();
    let source =
        source_file::source_file(&mut source_tree, &ctx.target.api_header(&env.paths));
    let mode = if cross_component { CollectMode::TemplateOnly } else { CollectMode::All };
    let collected = collect_members(&mut source_tree, &ctx, mode)?;
    let has_context_install = cross_component || collected.has_context_dependent();
    emit_source(&mut source_tree, source.body, &ctx, collected, cross_component)?;

    let mut impl_file = None;
    if cross_component {
        let mut impl_tree = CodeNodeTree::new();
        let impl_source =
            source_file::source_file(&mut impl_tree, &ctx.target.api_header(&env.paths));
        let impl_collected = collect_members(&mut impl_tree, &ctx, CollectMode::ContextOnly)?;
        emit_impl_source(&mut impl_tree, impl_source.body, &ctx, impl_collected)?;
        let content = renderer::render(&mut impl_tree, impl_source.root)?;
        impl_file = Some(GeneratedFile {
            path: env.paths.output_path(ctx.target.impl_component, &ctx.target.basename, "cc"),
            content,
        });
    }

    let mut header_tree = CodeNodeTree::new();
    let header =
        source_file::header_file(&mut header_tree, &ctx.target.api_header(&env.paths));
    make_header_class(&mut header_tree, header.body, &ctx, has_context_install, cross_component);

    let mut files = render_pair(
        env,
        ctx.target.api_component,
        &ctx.target.basename,
        &mut header_tree,
        header.root,
        &mut source_tree,
        source.root,
    )?;
    if let Some(file) = impl_file {
        files.push(file);
    }
    Ok(files)
}

struct Ctx<'a> {
    env: &'a RuntimeEnv,
    interface: &'a Interface,
    class_name: String,
    blink_class: String,
    target: TargetPaths,
}

impl Ctx<'_> {
    fn db(&self) -> &Database {
        &self.env.database
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Phase {
    Unconditional,
    ContextIndependent,
    ContextDependent,
}

fn phase_of(expr: &Expr) -> Phase {
    if expr.is_always_true() {
        Phase::Unconditional
    } else if expr.to_text().contains("${") {
        Phase::ContextDependent
    } else {
        Phase::ContextIndependent
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Site {
    Instance,
    Prototype,
    Interface,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum CollectMode {
    /// Everything into one translation unit.
    All,
    /// Unconditional and context-independent members only (API component of
    /// a cross-component interface).
    TemplateOnly,
    /// Context-dependent members only (Impl component).
    ContextOnly,
}

impl CollectMode {
    fn accepts(self, phase: Phase) -> bool {
        match self {
            CollectMode::All => true,
            CollectMode::TemplateOnly => phase != Phase::ContextDependent,
            CollectMode::ContextOnly => phase == Phase::ContextDependent,
        }
    }
}

#[derive(Default)]
struct Collected {
    callbacks: Vec<NodeId>,
    attributes: Vec<(Phase, Site, Expr, String)>,
    main_world_attributes: Vec<(Site, Expr, String)>,
    other_world_attributes: Vec<(Site, Expr, String)>,
    constants: Vec<(Phase, Expr, String)>,
    operations: Vec<(Phase, Site, Expr, String)>,
    exposed_constructs: Vec<(Phase, Expr, String)>,
    cross_origin_attribute_rows: Vec<String>,
    cross_origin_operation_rows: Vec<String>,
    /// Extra statements for `InstallInterfaceTemplate`: interceptor
    /// configurations, iteration intrinsics, fast-call tables.
    template_extras: Vec<NodeId>,
    /// Extra statements for the context-dependent installer (legacy factory
    /// functions).
    context_extras: Vec<NodeId>,
    constructor: Option<(String, usize)>,
}

impl Collected {
    fn has_context_dependent(&self) -> bool {
        !self.context_extras.is_empty()
            || self.attributes.iter().any(|(p, ..)| *p == Phase::ContextDependent)
            || self.constants.iter().any(|(p, ..)| *p == Phase::ContextDependent)
            || self.operations.iter().any(|(p, ..)| *p == Phase::ContextDependent)
            || self.exposed_constructs.iter().any(|(p, ..)| *p == Phase::ContextDependent)
    }

    fn entries(
        source: &[(Phase, Site, Expr, String)],
        phase: Phase,
        site: Site,
    ) -> Vec<common::InstallEntry> {
        source
            .iter()
            .filter(|(p, s, ..)| *p == phase && *s == site)
            .map(|(_, _, expr, text)| common::InstallEntry {
                exposure: expr.clone(),
                entry_text: text.clone(),
            })
            .collect()
    }

}

/// Globals the interface is exposed on, for the installer's `is_global_...`
/// locals.
fn global_names(interface: &Interface) -> Vec<String> {
    let mut names: Vec<String> = interface
        .exposure
        .global_names_and_features
        .iter()
        .map(|g| g.global_name.clone())
        .filter(|g| g != "*")
        .collect();
    names.sort();
    names.dedup();
    names
}

fn member_site(interface: &Interface, is_static: bool, ext_attrs: &ExtendedAttributes) -> Site {
    if is_static {
        Site::Interface
    } else if ext_attrs.has("LegacyUnforgeable") || interface.is_global() {
        Site::Instance
    } else {
        Site::Prototype
    }
}

fn property_flags(readonly_entry: bool, ext_attrs: &ExtendedAttributes) -> String {
    let mut flags = Vec::new();
    if readonly_entry {
        flags.push("v8::ReadOnly");
    }
    if ext_attrs.has("NotEnumerable") {
        flags.push("v8::DontEnum");
    }
    if ext_attrs.has("LegacyUnforgeable") {
        flags.push("v8::DontDelete");
    }
    if flags.is_empty() {
        "v8::None".to_string()
    } else {
        flags.join(" | ")
    }
}

/// `[CallWith=...]` (and friends) become leading implementation arguments.
fn call_with_args(
    ext_attrs: &ExtendedAttributes,
    keys: &[&str],
) -> (Vec<&'static str>, Vec<String>) {
    let mut deps = Vec::new();
    let mut exprs = Vec::new();
    for key in keys {
        for value in ext_attrs.values_of(key) {
            match value.as_str() {
                "ScriptState" => {
                    deps.push("script_state");
                    exprs.push("${script_state}".to_string());
                }
                "ExecutionContext" => {
                    deps.push("execution_context");
                    exprs.push("${execution_context}".to_string());
                }
                "Isolate" => {
                    deps.push("isolate");
                    exprs.push("${isolate}".to_string());
                }
                _ => {}
            }
        }
    }
    (deps, exprs)
}

/// Whether `[RaisesException]` applies to this accessor flavor. A bare
/// annotation applies to both flavors.
fn raises_exception(ext_attrs: &ExtendedAttributes, flavor: Option<&str>) -> bool {
    if !ext_attrs.has("RaisesException") {
        return false;
    }
    let values = ext_attrs.values_of("RaisesException");
    match flavor {
        Some(flavor) => values.is_empty() || values.iter().any(|v| v == flavor),
        None => true,
    }
}

fn impl_property<'a>(ext_attrs: &'a ExtendedAttributes, identifier: &'a str) -> &'a str {
    ext_attrs.value_of("ImplementedAs").unwrap_or(identifier)
}

struct CallSpec<'a> {
    is_static: bool,
    method: String,
    ext_attrs: &'a ExtendedAttributes,
    call_with_keys: &'a [&'a str],
    raises_flavor: Option<&'a str>,
    arguments: &'a [Argument],
    return_type: &'a IdlType,
}

/// Argument conversions, the implementation call, the exception check and the
/// return-value write.
fn make_member_call(
    tree: &mut CodeNodeTree,
    ctx: &Ctx<'_>,
    spec: &CallSpec<'_>,
) -> Result<Vec<NodeId>, GenerationError> {
    let db = ctx.db();
    let mut nodes = Vec::new();
    for arg in spec.arguments {
        nodes.push(common::make_v8_to_blink_argument(tree, db, arg)?);
    }

    let (mut deps, mut call_args) = call_with_args(spec.ext_attrs, spec.call_with_keys);
    call_args.extend(spec.arguments.iter().map(common::argument_var_name));
    let may_throw = raises_exception(spec.ext_attrs, spec.raises_flavor);
    if may_throw {
        deps.push("exception_state");
        call_args.push("${exception_state}".to_string());
    }

    let callee = if spec.is_static {
        format!("{}::{}", ctx.blink_class, spec.method)
    } else {
        deps.push("blink_receiver");
        format!("${{blink_receiver}}->{}", spec.method)
    };
    let call_expr = format!("{callee}({})", call_args.join(", "));
    let call_text = if spec.return_type.is_undefined() {
        format!("{call_expr};\n")
    } else {
        format!("auto&& return_value = {call_expr};\n")
    };
    nodes.push(common::text_with_symbols(tree, &call_text, &deps));

    if may_throw {
        nodes.push(common::text_with_symbols(
            tree,
            "if (${exception_state}.HadException()) [[unlikely]] {\n  return;\n}\n",
            &["exception_state"],
        ));
    }

    let unwrapped = spec.return_type.unwrap(db, UnwrapFlags::typedefs_only());
    if spec.is_static && unwrapped.is_interface(db) {
        // No receiver to wrap against; go through the type's own traits.
        let tag = type_bridge::native_value_tag(db, spec.return_type)?;
        nodes.push(common::text_with_symbols(
            tree,
            &format!(
                "bindings::V8SetReturnValue(info, \
                 ToV8Traits<{tag}>::ToV8(${{script_state}}, return_value));\n"
            ),
            &["script_state"],
        ));
    } else if let Some(set) =
        common::make_v8_set_return_value(tree, db, spec.return_type, "return_value")?
    {
        nodes.push(set);
    }
    Ok(nodes)
}

#[allow(clippy::too_many_arguments)]
fn make_callback_def(
    tree: &mut CodeNodeTree,
    ctx: &Ctx<'_>,
    callback_name: &str,
    property_name: &str,
    exception_context: &str,
    ext_attrs: &ExtendedAttributes,
    num_required_args: usize,
    counter_suffix: &str,
    body_nodes: Vec<NodeId>,
) -> NodeId {
    let func = cxx::func_def(
        tree,
        callback_name,
        &["const v8::FunctionCallbackInfo<v8::Value>& info".to_string()],
        "void",
        &FuncQuals::default(),
    );
    common::bind_callback_local_vars_with_receiver(
        tree,
        func.body,
        &ctx.class_name,
        &ctx.blink_class,
        &ctx.interface.identifier,
        property_name,
        exception_context,
    );
    let prologue = common::make_prologue(
        tree,
        &common::PrologueSpec {
            class_name: &ctx.interface.identifier,
            property_name,
            ext_attrs,
            num_required_args,
            counter_suffix,
        },
    );
    for step in prologue {
        tree.append(func.body, step);
    }
    for node in body_nodes {
        tree.append(func.body, node);
    }
    func.node
}

fn collect_members(
    tree: &mut CodeNodeTree,
    ctx: &Ctx<'_>,
    mode: CollectMode,
) -> Result<Collected, GenerationError> {
    let mut collected = Collected::default();
    collect_attributes(tree, ctx, mode, &mut collected)?;
    collect_constants(tree, ctx, mode, &mut collected)?;
    collect_operations(tree, ctx, mode, &mut collected)?;
    collect_stringifier(tree, ctx, mode, &mut collected)?;
    collect_exposed_constructs(tree, ctx, mode, &mut collected)?;
    if mode.accepts(Phase::Unconditional) {
        collect_constructors(tree, ctx, &mut collected)?;
        collect_iteration_members(tree, ctx, &mut collected)?;
        collect_interceptors(tree, ctx, &mut collected)?;
        collect_cross_origin_support(tree, ctx, &mut collected);
    }
    if mode.accepts(Phase::ContextDependent) {
        collect_legacy_factory_functions(tree, ctx, &mut collected)?;
    }
    Ok(collected)
}

// ---------------------------------------------------------------------------
// Attributes.

fn collect_attributes(
    tree: &mut CodeNodeTree,
    ctx: &Ctx<'_>,
    mode: CollectMode,
    out: &mut Collected,
) -> Result<(), GenerationError> {
    for attribute in &ctx.interface.attributes {
        let expr = expr_from_exposure(&attribute.exposure, true);
        if expr.is_always_false() {
            continue;
        }
        let phase = phase_of(&expr);
        if !mode.accepts(phase) {
            continue;
        }

        let camel = name_style::class_name(&attribute.identifier);
        let get_callback = format!("{camel}AttributeGetCallback");
        let getter_body = make_attribute_getter_body(tree, ctx, attribute)?;
        let def = make_callback_def(
            tree,
            ctx,
            &get_callback,
            &attribute.identifier,
            "AttributeGet",
            &attribute.ext_attrs,
            0,
            "_Getter",
            getter_body,
        );
        out.callbacks.push(def);

        let set_callback = if attribute.does_have_setter()
            || attribute.ext_attrs.has("LegacyLenientSetter")
        {
            let name = format!("{camel}AttributeSetCallback");
            let setter_body = make_attribute_setter_body(tree, ctx, attribute)?;
            let def = make_callback_def(
                tree,
                ctx,
                &name,
                &attribute.identifier,
                "AttributeSet",
                &attribute.ext_attrs,
                1,
                "_Setter",
                setter_body,
            );
            out.callbacks.push(def);
            Some(name)
        } else {
            None
        };

        let site = member_site(ctx.interface, attribute.is_static, &attribute.ext_attrs);
        let flags = property_flags(set_callback.is_none(), &attribute.ext_attrs);
        let entry = |get: &str, set: Option<&str>| {
            format!(
                "{{\"{}\", {get}, {}, unsigned({flags})}}",
                attribute.identifier,
                set.unwrap_or("nullptr"),
            )
        };

        if attribute.ext_attrs.has("CrossOrigin") {
            let values = attribute.ext_attrs.values_of("CrossOrigin");
            let get = values.is_empty() || values.iter().any(|v| v == "Getter");
            let set = values.iter().any(|v| v == "Setter") && set_callback.is_some();
            out.cross_origin_attribute_rows.push(format!(
                "{{\"{}\", {}, {}}}",
                attribute.identifier,
                if get { get_callback.as_str() } else { "nullptr" },
                if set { set_callback.as_deref().unwrap_or("nullptr") } else { "nullptr" },
            ));
        }

        if attribute.ext_attrs.has("PerWorldBindings") && phase == Phase::Unconditional {
            let main_callback = format!("{get_callback}ForMainWorld");
            let main_body = make_attribute_getter_body(tree, ctx, attribute)?;
            let def = make_callback_def(
                tree,
                ctx,
                &main_callback,
                &attribute.identifier,
                "AttributeGet",
                &attribute.ext_attrs,
                0,
                "_Getter",
                main_body,
            );
            out.callbacks.push(def);
            out.main_world_attributes.push((
                site,
                expr.clone(),
                entry(&main_callback, set_callback.as_deref()),
            ));
            out.other_world_attributes.push((
                site,
                expr,
                entry(&get_callback, set_callback.as_deref()),
            ));
        } else {
            out.attributes.push((
                phase,
                site,
                expr,
                entry(&get_callback, set_callback.as_deref()),
            ));
        }
    }
    Ok(())
}

fn make_attribute_getter_body(
    tree: &mut CodeNodeTree,
    ctx: &Ctx<'_>,
    attribute: &Attribute,
) -> Result<Vec<NodeId>, GenerationError> {
    let db = ctx.db();
    let method = impl_property(&attribute.ext_attrs, &attribute.identifier).to_string();

    if attribute.ext_attrs.value_of("CheckSecurity") == Some("ReturnValue") {
        return make_checked_return_value_getter(tree, ctx, attribute, &method);
    }

    if attribute.idl_type.is_observable_array() {
        // The getter hands out the exotic object backed by the attribute's
        // observable array.
        let node = common::text_with_symbols(
            tree,
            &format!(
                "auto&& return_value = ${{blink_receiver}}->{method}();\n\
                 bindings::V8SetReturnValue(info, return_value, ${{blink_receiver}}, \
                 bindings::V8ReturnValue::kMaybeWrapped);\n"
            ),
            &["blink_receiver"],
        );
        return Ok(vec![node]);
    }

    let call = make_member_call(
        tree,
        ctx,
        &CallSpec {
            is_static: attribute.is_static,
            method,
            ext_attrs: &attribute.ext_attrs,
            call_with_keys: &["CallWith", "GetterCallWith"],
            raises_flavor: Some("Getter"),
            arguments: &[],
            return_type: &attribute.idl_type,
        },
    )?;

    let caching = attribute.ext_attrs.has("SaveSameObject")
        || attribute.ext_attrs.has("CachedAttribute");
    if !caching {
        return Ok(call);
    }

    // The wrapped value is cached in a private property on the receiver.
    tree.accumulate(
        call[0],
        include("third_party/blink/renderer/platform/bindings/v8_private_property.h"),
    );
    let camel = name_style::class_name(&attribute.identifier);
    let mut nodes = Vec::new();
    let invalidation = attribute
        .ext_attrs
        .value_of("CachedAttribute")
        .map(|pred| format!("!${{blink_receiver}}->{pred}() &&\n      "))
        .unwrap_or_default();
    nodes.push(common::text_with_symbols(
        tree,
        &format!(
            "static const V8PrivateProperty::SymbolKey kPrivatePropertyCached{camel};\n\
             auto&& private_property =\n\
             \x20   V8PrivateProperty::GetSymbol(${{isolate}}, kPrivatePropertyCached{camel});\n\
             {{\n\
             \x20 v8::Local<v8::Value> cached_value;\n\
             \x20 if ({invalidation}\
             private_property.GetOrUndefined(${{v8_receiver}}).ToLocal(&cached_value) &&\n\
             \x20     !cached_value->IsUndefined()) {{\n\
             \x20   bindings::V8SetReturnValue(info, cached_value);\n\
             \x20   return;\n\
             \x20 }}\n\
             }}\n"
        ),
        &["isolate", "v8_receiver", "blink_receiver"],
    ));
    // Drop the plain return-value write; the cached path stores then returns
    // the v8 value it wrapped.
    let tag = type_bridge::native_value_tag(db, &attribute.idl_type)?;
    let without_set = call.len() - 1;
    nodes.extend(call.into_iter().take(without_set));
    nodes.push(common::text_with_symbols(
        tree,
        &format!(
            "v8::Local<v8::Value> v8_value =\n\
             \x20   ToV8Traits<{tag}>::ToV8(${{script_state}}, return_value);\n\
             std::ignore = private_property.Set(${{v8_receiver}}, v8_value);\n\
             bindings::V8SetReturnValue(info, v8_value);\n"
        ),
        &["script_state", "v8_receiver"],
    ));
    Ok(nodes)
}

/// `[CheckSecurity=ReturnValue]`: the returned frame content is only handed
/// out when the caller may access it, and is wrapped in its own realm.
fn make_checked_return_value_getter(
    tree: &mut CodeNodeTree,
    ctx: &Ctx<'_>,
    attribute: &Attribute,
    method: &str,
) -> Result<Vec<NodeId>, GenerationError> {
    let db = ctx.db();
    let tag = type_bridge::native_value_tag(db, &attribute.idl_type)?;
    let counter = format!(
        "kCrossOrigin{}{}",
        ctx.interface.identifier,
        name_style::class_name(&attribute.identifier)
    );
    let node = common::text_with_symbols(
        tree,
        &format!(
            "auto&& return_value = ${{blink_receiver}}->{method}();\n\
             if (!return_value || !return_value->GetFrame()) [[unlikely]] {{\n\
             \x20 bindings::V8SetReturnValueNull(info);\n\
             \x20 return;\n\
             }}\n\
             if (!BindingSecurity::ShouldAllowAccessTo(\n\
             \x20       ToLocalDOMWindow(${{current_context}}), return_value)) [[unlikely]] {{\n\
             \x20 UseCounter::Count(${{execution_context}}, WebFeature::{counter});\n\
             \x20 bindings::V8SetReturnValueNull(info);\n\
             \x20 return;\n\
             }}\n\
             // Wrap in the realm of the returned content, not the receiver's.\n\
             ScriptState* target_script_state =\n\
             \x20   ToScriptState(return_value->GetFrame(), ${{script_state}}->World());\n\
             bindings::V8SetReturnValue(\n\
             \x20   info, ToV8Traits<{tag}>::ToV8(target_script_state, return_value));\n"
        ),
        &["blink_receiver", "current_context", "execution_context", "script_state"],
    );
    tree.accumulate(
        node,
        include("third_party/blink/renderer/bindings/core/v8/binding_security.h"),
    );
    Ok(vec![node])
}

fn make_attribute_setter_body(
    tree: &mut CodeNodeTree,
    ctx: &Ctx<'_>,
    attribute: &Attribute,
) -> Result<Vec<NodeId>, GenerationError> {
    if attribute.ext_attrs.has("LegacyLenientSetter") {
        return Ok(vec![tree.literal("// [LegacyLenientSetter]\n".to_string())]);
    }

    if let Some(forward) = attribute.ext_attrs.value_of("PutForwards") {
        let node = common::text_with_symbols(
            tree,
            &format!(
                "// [PutForwards] assigns through `{attr}.{forward}`.\n\
                 v8::Local<v8::Value> target;\n\
                 if (!${{v8_receiver}}\n\
                 \x20        ->Get(${{current_context}}, \
                 V8AtomicString(${{isolate}}, \"{attr}\"))\n\
                 \x20        .ToLocal(&target)) {{\n\
                 \x20 return;\n\
                 }}\n\
                 if (!target->IsObject()) [[unlikely]] {{\n\
                 \x20 ${{exception_state}}.ThrowTypeError(\
                 \"The attribute value is not an object.\");\n\
                 \x20 return;\n\
                 }}\n\
                 bool did_set;\n\
                 if (!target.As<v8::Object>()\n\
                 \x20        ->Set(${{current_context}}, \
                 V8AtomicString(${{isolate}}, \"{forward}\"), info[0])\n\
                 \x20        .To(&did_set)) {{\n\
                 \x20 return;\n\
                 }}\n",
                attr = attribute.identifier,
            ),
            &["v8_receiver", "current_context", "isolate", "exception_state"],
        );
        return Ok(vec![node]);
    }

    if attribute.ext_attrs.has("Replaceable") {
        let node = common::text_with_symbols(
            tree,
            &format!(
                "// [Replaceable] shadows the accessor with a data property.\n\
                 bool did_create;\n\
                 if (!${{v8_receiver}}\n\
                 \x20        ->CreateDataProperty(${{current_context}}, \
                 V8AtomicString(${{isolate}}, \"{}\"), info[0])\n\
                 \x20        .To(&did_create)) {{\n\
                 \x20 return;\n\
                 }}\n",
                attribute.identifier,
            ),
            &["v8_receiver", "current_context", "isolate"],
        );
        return Ok(vec![node]);
    }

    if attribute.idl_type.is_observable_array() {
        let method = impl_property(&attribute.ext_attrs, &attribute.identifier);
        let node = common::text_with_symbols(
            tree,
            &format!(
                "auto&& backing_list = ${{blink_receiver}}->{method}();\n\
                 backing_list->PerformAttributeSet(${{script_state}}, info[0], \
                 ${{exception_state}});\n"
            ),
            &["blink_receiver", "script_state", "exception_state"],
        );
        return Ok(vec![node]);
    }

    let value_arg = Argument {
        identifier: attribute.identifier.clone(),
        idl_type: attribute.idl_type.clone(),
        index: 0,
        is_optional: false,
        default_value: None,
    };
    let method = format!(
        "set{}",
        name_style::class_name(impl_property(&attribute.ext_attrs, &attribute.identifier))
    );
    make_member_call(
        tree,
        ctx,
        &CallSpec {
            is_static: attribute.is_static,
            method,
            ext_attrs: &attribute.ext_attrs,
            call_with_keys: &["CallWith", "SetterCallWith"],
            raises_flavor: Some("Setter"),
            arguments: std::slice::from_ref(&value_arg),
            return_type: &IdlType::new(TypeKind::Undefined),
        },
    )
}

// ---------------------------------------------------------------------------
// Constants.

fn collect_constants(
    _tree: &mut CodeNodeTree,
    ctx: &Ctx<'_>,
    mode: CollectMode,
    out: &mut Collected,
) -> Result<(), GenerationError> {
    for constant in &ctx.interface.constants {
        let expr = expr_from_exposure(&constant.exposure, true);
        if expr.is_always_false() {
            continue;
        }
        let phase = phase_of(&expr);
        if !mode.accepts(phase) {
            continue;
        }
        let value_t = type_bridge::blink_type_info(ctx.db(), &constant.idl_type)?.value_t;
        out.constants.push((
            phase,
            expr,
            format!(
                "{{\"{}\", static_cast<{value_t}>({})}}",
                constant.identifier, constant.value_literal
            ),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Operations, overloads and the fast-call path.

fn collect_operations(
    tree: &mut CodeNodeTree,
    ctx: &Ctx<'_>,
    mode: CollectMode,
    out: &mut Collected,
) -> Result<(), GenerationError> {
    for group in &ctx.interface.operation_groups {
        if group.identifier.is_empty() {
            // Anonymous special operations surface through the interceptors.
            continue;
        }
        let expr = expr_from_exposure(&group.exposure, true);
        if expr.is_always_false() {
            continue;
        }
        let phase = phase_of(&expr);
        if !mode.accepts(phase) {
            continue;
        }

        let camel = name_style::class_name(&group.identifier);
        let entry_callback = if group.operations.len() == 1 {
            format!("{camel}OperationCallback")
        } else {
            format!("{camel}OverloadDispatcher")
        };

        if group.operations.len() == 1 {
            let operation = &group.operations[0];
            let call = make_operation_call(tree, ctx, operation)?;
            let def = make_operation_callback(tree, ctx, &entry_callback, operation, call);
            out.callbacks.push(def);
            if operation.ext_attrs.has("PerWorldBindings") && phase == Phase::Unconditional {
                let main_callback = format!("{entry_callback}ForMainWorld");
                let call = make_operation_call(tree, ctx, operation)?;
                let def = make_operation_callback(tree, ctx, &main_callback, operation, call);
                out.callbacks.push(def);
            }
        } else {
            let mut targets: Vec<common::OverloadTarget<'_>> = Vec::new();
            for (index, operation) in group.operations.iter().enumerate() {
                let callback_name = format!("{camel}Overload{}Callback", index + 1);
                let call = make_operation_call(tree, ctx, operation)?;
                let def = make_operation_callback(tree, ctx, &callback_name, operation, call);
                out.callbacks.push(def);
                targets.push(common::OverloadTarget {
                    callback_name,
                    arguments: &operation.arguments,
                });
            }
            let dispatcher = common::make_overload_dispatcher(tree, ctx.db(), &targets)?;
            let def = make_callback_def(
                tree,
                ctx,
                &entry_callback,
                &group.identifier,
                "Operation",
                &group.ext_attrs,
                0,
                "_Method",
                vec![dispatcher],
            );
            out.callbacks.push(def);
        }

        if group.ext_attrs.has("CrossOrigin")
            || group.operations.iter().any(|op| op.ext_attrs.has("CrossOrigin"))
        {
            out.cross_origin_operation_rows.push(format!(
                "{{\"{}\", {entry_callback}, {}}}",
                group.identifier,
                group.min_num_of_required_arguments(),
            ));
        }

        let installed_via_fast_call = phase == Phase::Unconditional
            && collect_no_alloc_direct_call(tree, ctx, group, &camel, &entry_callback, out)?;
        if installed_via_fast_call {
            continue;
        }

        let site = member_site(ctx.interface, group.is_static(), &group.ext_attrs);
        out.operations.push((
            phase,
            site,
            expr,
            format!(
                "{{\"{}\", {entry_callback}, {}, unsigned({})}}",
                group.identifier,
                group.min_num_of_required_arguments(),
                property_flags(false, &group.ext_attrs),
            ),
        ));
    }
    Ok(())
}

fn make_operation_call(
    tree: &mut CodeNodeTree,
    ctx: &Ctx<'_>,
    operation: &Operation,
) -> Result<Vec<NodeId>, GenerationError> {
    let method = impl_property(&operation.ext_attrs, &operation.identifier).to_string();
    make_member_call(
        tree,
        ctx,
        &CallSpec {
            is_static: operation.is_static,
            method,
            ext_attrs: &operation.ext_attrs,
            call_with_keys: &["CallWith"],
            raises_flavor: None,
            arguments: &operation.arguments,
            return_type: &operation.return_type,
        },
    )
}

fn make_operation_callback(
    tree: &mut CodeNodeTree,
    ctx: &Ctx<'_>,
    callback_name: &str,
    operation: &Operation,
    body: Vec<NodeId>,
) -> NodeId {
    make_callback_def(
        tree,
        ctx,
        callback_name,
        &operation.identifier,
        "Operation",
        &operation.ext_attrs,
        operation.num_of_required_arguments(),
        "_Method",
        body,
    )
}

fn fast_call_type(db: &Database, idl_type: &IdlType) -> Option<&'static str> {
    let unwrapped = idl_type.unwrap(db, UnwrapFlags::typedefs_only());
    match &unwrapped.kind {
        TypeKind::Undefined => Some("void"),
        TypeKind::Boolean => Some("bool"),
        TypeKind::Integer(kind) => match kind {
            IntegerKind::Byte | IntegerKind::Short | IntegerKind::Long => Some("int32_t"),
            IntegerKind::Octet | IntegerKind::UnsignedShort | IntegerKind::UnsignedLong => {
                Some("uint32_t")
            }
            _ => None,
        },
        TypeKind::FloatingPoint { kind, .. } => match kind {
            web_idl::FloatKind::Float => Some("float"),
            web_idl::FloatKind::Double => Some("double"),
        },
        _ => None,
    }
}

/// `[NoAllocDirectCall]` overloads get a C-callable variant per acceptable
/// argument count, registered alongside the regular callback. When any fast
/// argument carries `[EnforceRange]` the fast path is compiled out on x86,
/// falling back to the regular callback.
fn collect_no_alloc_direct_call(
    tree: &mut CodeNodeTree,
    ctx: &Ctx<'_>,
    group: &OperationGroup,
    camel: &str,
    entry_callback: &str,
    out: &mut Collected,
) -> Result<bool, GenerationError> {
    let db = ctx.db();
    let mut table_rows: Vec<String> = Vec::new();
    let mut fast_defs: Vec<String> = Vec::new();
    let mut any_enforce_range = false;

    for (index, operation) in group.operations.iter().enumerate() {
        if !operation.ext_attrs.has("NoAllocDirectCall") || operation.is_static {
            continue;
        }
        let Some(return_t) = fast_call_type(db, &operation.return_type) else { continue };
        let arg_types: Option<Vec<&'static str>> = operation
            .arguments
            .iter()
            .map(|arg| fast_call_type(db, &arg.idl_type))
            .collect();
        let Some(arg_types) = arg_types else { continue };
        any_enforce_range |= operation
            .arguments
            .iter()
            .any(|arg| arg.idl_type.ext_attrs.has("EnforceRange"));

        let method = impl_property(&operation.ext_attrs, &operation.identifier).to_string();
        let num_required = operation.num_of_required_arguments();
        for count in num_required..=operation.arguments.len() {
            let name = format!("{camel}Overload{}Arg{count}Callback", index + 1);
            let mut params = vec!["v8::Local<v8::Object> v8_receiver".to_string()];
            let mut call_args = Vec::new();
            for (arg, c_type) in operation.arguments.iter().take(count).zip(&arg_types) {
                let var = common::argument_var_name(arg);
                params.push(format!("{c_type} {var}"));
                call_args.push(var);
            }
            params.push("v8::FastApiCallbackOptions& options".to_string());
            let ret = if return_t == "void" { String::new() } else { "return ".to_string() };
            fast_defs.push(format!(
                "{return_t} {name}({}) {{\n\
                 \x20 {blink}* blink_receiver =\n\
                 \x20     {v8}::ToWrappableUnsafe(options.isolate, v8_receiver);\n\
                 \x20 {ret}blink_receiver->{method}({});\n\
                 }}\n",
                params.join(", "),
                call_args.join(", "),
                blink = ctx.blink_class,
                v8 = ctx.class_name,
            ));
            table_rows.push(format!("v8::CFunctionBuilder().Fn({name}).Build(),"));
        }
    }
    if table_rows.is_empty() {
        return Ok(false);
    }

    let guard = any_enforce_range && ctx.env.options.enforce_range_x86_guard;
    let mut defs_text = String::new();
    if guard {
        defs_text.push_str("#if !defined(ARCH_CPU_X86)\n");
    }
    for def in &fast_defs {
        defs_text.push_str(def);
        defs_text.push('\n');
    }
    if guard {
        defs_text.push_str("#endif  // !defined(ARCH_CPU_X86)\n");
    }
    let defs = tree.literal(defs_text);
    out.callbacks.push(defs);

    let table_var = format!("kNoAllocDirectCallOverloadsOf{camel}");
    let config = format!(
        "static const bindings::OperationConfig kOperationConfig = {{\n\
         \x20     \"{name}\", {entry_callback}, {len}, unsigned(v8::None)}};\n",
        name = group.identifier,
        len = group.min_num_of_required_arguments(),
    );
    let table = format!(
        "static const v8::CFunction {table_var}[] = {{\n      {}\n  }};\n",
        table_rows.join("\n      "),
    );
    let fast_install = format!(
        "bindings::InstallNoAllocDirectCallOperation(\n\
         \x20     isolate, world, prototype_template, kOperationConfig, {table_var});\n"
    );
    let install_text = if guard {
        format!(
            "{{\n\
             \x20 {config}\
             #if !defined(ARCH_CPU_X86)\n\
             \x20 {table}\
             \x20 {fast_install}\
             #else\n\
             \x20 bindings::InstallOperations(\n\
             \x20     isolate, world, v8::Local<v8::Template>(), prototype_template,\n\
             \x20     v8::Local<v8::Template>(), base::span_from_ref(kOperationConfig));\n\
             #endif  // !defined(ARCH_CPU_X86)\n\
             }}\n"
        )
    } else {
        format!("{{\n  {config}  {table}  {fast_install}}}\n")
    };
    let node = tree.literal(install_text);
    out.template_extras.push(node);
    Ok(true)
}

// ---------------------------------------------------------------------------
// Stringifier.

fn collect_stringifier(
    tree: &mut CodeNodeTree,
    ctx: &Ctx<'_>,
    mode: CollectMode,
    out: &mut Collected,
) -> Result<(), GenerationError> {
    let Some(stringifier) = &ctx.interface.stringifier else { return Ok(()) };
    let expr = expr_from_exposure(&stringifier.exposure, true);
    if expr.is_always_false() {
        return Ok(());
    }
    let phase = phase_of(&expr);
    if !mode.accepts(phase) {
        return Ok(());
    }

    let method = stringifier
        .operation
        .as_deref()
        .or(stringifier.attribute.as_deref())
        .unwrap_or("toString");
    let body = common::text_with_symbols(
        tree,
        &format!(
            "auto&& return_value = ${{blink_receiver}}->{method}();\n\
             bindings::V8SetReturnValue(info, return_value, ${{isolate}});\n"
        ),
        &["blink_receiver", "isolate"],
    );
    let def = make_callback_def(
        tree,
        ctx,
        "ToStringOperationCallback",
        "toString",
        "Operation",
        &stringifier.ext_attrs,
        0,
        "_Method",
        vec![body],
    );
    out.callbacks.push(def);
    out.operations.push((
        phase,
        Site::Prototype,
        expr,
        "{\"toString\", ToStringOperationCallback, 0, unsigned(v8::None)}".to_string(),
    ));
    Ok(())
}

// ---------------------------------------------------------------------------
// Constructors and legacy factory functions.

fn make_constructor_body(
    tree: &mut CodeNodeTree,
    ctx: &Ctx<'_>,
    constructor: &web_idl::Constructor,
) -> Result<Vec<NodeId>, GenerationError> {
    let db = ctx.db();
    let mut nodes = Vec::new();
    nodes.push(common::text_with_symbols(
        tree,
        "if (!info.IsConstructCall()) [[unlikely]] {\n\
         \x20 ${exception_state}.ThrowTypeError(\n\
         \x20     ExceptionMessages::ConstructorCalledAsFunction());\n\
         \x20 return;\n\
         }\n\
         if (ConstructorMode::Current(${isolate}) == \
         ConstructorMode::kWrapExistingObject) {\n\
         \x20 bindings::V8SetReturnValue(info, ${v8_receiver});\n\
         \x20 return;\n\
         }\n",
        &["exception_state", "isolate", "v8_receiver"],
    ));
    for arg in &constructor.arguments {
        nodes.push(common::make_v8_to_blink_argument(tree, db, arg)?);
    }
    let (mut deps, mut call_args) = call_with_args(&constructor.ext_attrs, &["CallWith"]);
    call_args.extend(constructor.arguments.iter().map(common::argument_var_name));
    let may_throw = raises_exception(&constructor.ext_attrs, None);
    if may_throw {
        deps.push("exception_state");
        call_args.push("${exception_state}".to_string());
    }
    nodes.push(common::text_with_symbols(
        tree,
        &format!(
            "{blink}* blink_instance = {blink}::Create({});\n",
            call_args.join(", "),
            blink = ctx.blink_class,
        ),
        &deps,
    ));
    if may_throw {
        nodes.push(common::text_with_symbols(
            tree,
            "if (${exception_state}.HadException()) [[unlikely]] {\n  return;\n}\n",
            &["exception_state"],
        ));
    }
    nodes.push(common::text_with_symbols(
        tree,
        &format!(
            "bindings::V8SetReturnValue(\n\
             \x20   info, blink_instance->AssociateWithWrapper(\n\
             \x20             ${{isolate}}, {}::GetWrapperTypeInfo(), ${{v8_receiver}}));\n",
            ctx.class_name,
        ),
        &["isolate", "v8_receiver"],
    ));
    Ok(nodes)
}

fn make_constructor_group_callback(
    tree: &mut CodeNodeTree,
    ctx: &Ctx<'_>,
    group: &ConstructorGroup,
    callback_name: &str,
    out: &mut Collected,
) -> Result<(), GenerationError> {
    if group.constructors.len() == 1 {
        let body = make_constructor_body(tree, ctx, &group.constructors[0])?;
        let def = make_callback_def(
            tree,
            ctx,
            callback_name,
            &ctx.interface.identifier,
            "Constructor",
            &group.constructors[0].ext_attrs,
            group.constructors[0].num_of_required_arguments(),
            "_Constructor",
            body,
        );
        out.callbacks.push(def);
        return Ok(());
    }
    let mut targets: Vec<common::OverloadTarget<'_>> = Vec::new();
    for (index, constructor) in group.constructors.iter().enumerate() {
        let overload_name = format!("ConstructorOverload{}Callback", index + 1);
        let body = make_constructor_body(tree, ctx, constructor)?;
        let def = make_callback_def(
            tree,
            ctx,
            &overload_name,
            &ctx.interface.identifier,
            "Constructor",
            &constructor.ext_attrs,
            constructor.num_of_required_arguments(),
            "_Constructor",
            body,
        );
        out.callbacks.push(def);
        targets.push(common::OverloadTarget {
            callback_name: overload_name,
            arguments: &constructor.arguments,
        });
    }
    let dispatcher = common::make_overload_dispatcher(tree, ctx.db(), &targets)?;
    let def = make_callback_def(
        tree,
        ctx,
        callback_name,
        &ctx.interface.identifier,
        "Constructor",
        &group.ext_attrs,
        0,
        "_Constructor",
        vec![dispatcher],
    );
    out.callbacks.push(def);
    Ok(())
}

fn collect_constructors(
    tree: &mut CodeNodeTree,
    ctx: &Ctx<'_>,
    out: &mut Collected,
) -> Result<(), GenerationError> {
    for group in &ctx.interface.constructor_groups {
        let expr = expr_from_exposure(&group.exposure, true);
        if expr.is_always_false() {
            continue;
        }
        make_constructor_group_callback(tree, ctx, group, "ConstructorCallback", out)?;
        let length = group
            .constructors
            .iter()
            .map(web_idl::Constructor::num_of_required_arguments)
            .min()
            .unwrap_or(0);
        out.constructor = Some(("ConstructorCallback".to_string(), length));
    }
    Ok(())
}

fn collect_legacy_factory_functions(
    tree: &mut CodeNodeTree,
    ctx: &Ctx<'_>,
    out: &mut Collected,
) -> Result<(), GenerationError> {
    for group in &ctx.interface.legacy_factory_function_groups {
        let expr = expr_from_exposure(&group.exposure, true);
        if expr.is_always_false() {
            continue;
        }
        let callback_name =
            format!("{}LegacyFactoryFunctionCallback", name_style::class_name(&group.identifier));
        make_constructor_group_callback(tree, ctx, group, &callback_name, out)?;
        let length = group
            .constructors
            .iter()
            .map(web_idl::Constructor::num_of_required_arguments)
            .min()
            .unwrap_or(0);
        let install = tree.literal(format!(
            "// [LegacyFactoryFunction] {name}\n\
             {{\n\
             \x20 v8::Local<v8::Function> legacy_factory_function;\n\
             \x20 if (v8::FunctionTemplate::New(isolate, {callback_name},\n\
             \x20                               v8::Local<v8::Value>(),\n\
             \x20                               v8::Local<v8::Signature>(), {length})\n\
             \x20         ->GetFunction(script_state->GetContext())\n\
             \x20         .ToLocal(&legacy_factory_function)) {{\n\
             \x20   legacy_factory_function->SetName(V8AtomicString(isolate, \"{name}\"));\n\
             \x20   std::ignore = script_state->GetContext()->Global()->CreateDataProperty(\n\
             \x20       script_state->GetContext(), V8AtomicString(isolate, \"{name}\"),\n\
             \x20       legacy_factory_function);\n\
             \x20 }}\n\
             }}\n",
            name = group.identifier,
        ));
        if expr.is_always_true() {
            out.context_extras.push(install);
        } else {
            let guarded =
                cxx::if_(tree, Cond::Expr(expr), vec![install], Likeliness::Likely);
            out.context_extras.push(guarded);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Exposed constructs and legacy window aliases.

fn collect_exposed_constructs(
    tree: &mut CodeNodeTree,
    ctx: &Ctx<'_>,
    mode: CollectMode,
    out: &mut Collected,
) -> Result<(), GenerationError> {
    let mut constructs: Vec<(String, String, Expr)> = Vec::new();
    for construct in &ctx.interface.exposed_constructs {
        constructs.push((
            construct.identifier.clone(),
            construct.identifier.clone(),
            expr_from_exposure(&construct.exposure, true),
        ));
    }
    for alias in &ctx.interface.legacy_window_aliases {
        constructs.push((
            alias.identifier.clone(),
            alias.original.clone(),
            expr_from_exposure(&alias.exposure, true),
        ));
    }

    for (property_name, target, expr) in constructs {
        if expr.is_always_false() {
            continue;
        }
        if ctx
            .db()
            .find_interface(&target)
            .is_some_and(|i| i.ext_attrs.has("LegacyNoInterfaceObject"))
        {
            continue;
        }
        let phase = phase_of(&expr);
        if !mode.accepts(phase) {
            continue;
        }
        let callback_name =
            format!("{}ExposedConstructCallback", name_style::class_name(&property_name));
        let def = tree.literal(format!(
            "void {callback_name}(v8::Local<v8::Name> property_name,\n\
             \x20                 const v8::PropertyCallbackInfo<v8::Value>& info) {{\n\
             \x20 bindings::V8SetReturnValue(info, V8{target}::GetWrapperTypeInfo(),\n\
             \x20                            bindings::V8ReturnValue::kInterfaceObject);\n\
             }}\n"
        ));
        out.callbacks.push(def);
        if let Some(info) = ctx
            .db()
            .find_interface(&target)
            .map(|i| &i.code_generator_info)
            .or_else(|| ctx.db().find_namespace(&target).map(|n| &n.code_generator_info))
        {
            let component = info.components().0;
            let basename = format!("v8_{}", name_style::file(&target));
            tree.accumulate(def, include(ctx.env.paths.include_path(component, &basename, "h")));
        }
        out.exposed_constructs.push((
            phase,
            expr,
            format!("{{\"{property_name}\", {callback_name}}}"),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// iterable<>, maplike<>, setlike<> and async iterable<> members.

struct CollectionOp {
    name: &'static str,
    callback: String,
    length: usize,
    body: NodeId,
}

fn make_iteration_op(
    tree: &mut CodeNodeTree,
    name: &'static str,
) -> CollectionOp {
    let body = common::text_with_symbols(
        tree,
        &format!(
            "auto&& return_value = \
             ${{blink_receiver}}->{name}ForBinding(${{script_state}}, ${{exception_state}});\n\
             if (${{exception_state}}.HadException()) [[unlikely]] {{\n\
             \x20 return;\n\
             }}\n\
             bindings::V8SetReturnValue(info, return_value);\n"
        ),
        &["blink_receiver", "script_state", "exception_state"],
    );
    CollectionOp {
        name,
        callback: format!("{}OperationCallback", name_style::class_name(name)),
        length: 0,
        body,
    }
}

fn make_for_each_op(tree: &mut CodeNodeTree) -> CollectionOp {
    let body = common::text_with_symbols(
        tree,
        "if (!info[0]->IsFunction()) [[unlikely]] {\n\
         \x20 ${exception_state}.ThrowTypeError(\n\
         \x20     \"The callback provided as parameter 1 is not a function.\");\n\
         \x20 return;\n\
         }\n\
         V8ForEachIteratorCallback* arg0_callback =\n\
         \x20   V8ForEachIteratorCallback::Create(info[0].As<v8::Function>());\n\
         ScriptValue arg1_this_arg(${isolate}, info[1]);\n\
         ${blink_receiver}->forEachForBinding(\n\
         \x20   ${script_state}, ScriptValue(${isolate}, ${v8_receiver}), arg0_callback,\n\
         \x20   arg1_this_arg, ${exception_state});\n\
         if (${exception_state}.HadException()) [[unlikely]] {\n\
         \x20 return;\n\
         }\n",
        &["exception_state", "isolate", "blink_receiver", "script_state", "v8_receiver"],
    );
    CollectionOp {
        name: "forEach",
        callback: "ForEachOperationCallback".to_string(),
        length: 1,
        body,
    }
}

/// A keyed lookup-style member (`get`, `has`, `delete`, `add`, `set`).
fn make_keyed_op(
    tree: &mut CodeNodeTree,
    ctx: &Ctx<'_>,
    name: &'static str,
    arguments: Vec<Argument>,
    returns_receiver: bool,
    returns_value: bool,
) -> Result<CollectionOp, GenerationError> {
    let db = ctx.db();
    let mut nodes = Vec::new();
    for arg in &arguments {
        nodes.push(common::make_v8_to_blink_argument(tree, db, arg)?);
    }
    let call_args: Vec<String> = arguments.iter().map(common::argument_var_name).collect();
    let capture = if returns_receiver || !returns_value { "" } else { "auto&& return_value = " };
    nodes.push(common::text_with_symbols(
        tree,
        &format!(
            "{capture}${{blink_receiver}}->{name}ForBinding(\
             ${{script_state}}{}{}, ${{exception_state}});\n\
             if (${{exception_state}}.HadException()) [[unlikely]] {{\n\
             \x20 return;\n\
             }}\n",
            if call_args.is_empty() { "" } else { ", " },
            call_args.join(", "),
        ),
        &["blink_receiver", "script_state", "exception_state"],
    ));
    if returns_receiver {
        nodes.push(common::text_with_symbols(
            tree,
            "bindings::V8SetReturnValue(info, ${v8_receiver});\n",
            &["v8_receiver"],
        ));
    } else if returns_value {
        let node = tree.literal("bindings::V8SetReturnValue(info, return_value);\n".to_string());
        nodes.push(node);
    }
    let body = tree.sequence(nodes);
    Ok(CollectionOp {
        name,
        callback: format!("{}OperationCallback", name_style::class_name(name)),
        length: arguments.len(),
        body,
    })
}

fn key_argument(idl_type: &IdlType) -> Argument {
    Argument {
        identifier: "key".to_string(),
        idl_type: idl_type.clone(),
        index: 0,
        is_optional: false,
        default_value: None,
    }
}

fn value_argument(idl_type: &IdlType, index: usize) -> Argument {
    Argument {
        identifier: "value".to_string(),
        idl_type: idl_type.clone(),
        index,
        is_optional: false,
        default_value: None,
    }
}

fn collect_iteration_members(
    tree: &mut CodeNodeTree,
    ctx: &Ctx<'_>,
    out: &mut Collected,
) -> Result<(), GenerationError> {
    let empty = ExtendedAttributes::new();
    let mut ops: Vec<CollectionOp> = Vec::new();
    let mut has_size_attribute = false;
    let mut iterator_symbol_target: Option<&'static str> = None;

    if let Some(iterable) = &ctx.interface.iterable {
        match iterable.kind() {
            IteratorKind::Value => {
                // Value iterables reuse the Array.prototype iteration methods.
                let node = tree.literal(
                    "prototype_template->SetIntrinsicDataProperty(\n\
                     \x20   V8AtomicString(isolate, \"entries\"), v8::kArrayProto_entries);\n\
                     prototype_template->SetIntrinsicDataProperty(\n\
                     \x20   V8AtomicString(isolate, \"forEach\"), v8::kArrayProto_forEach);\n\
                     prototype_template->SetIntrinsicDataProperty(\n\
                     \x20   V8AtomicString(isolate, \"keys\"), v8::kArrayProto_keys);\n\
                     prototype_template->SetIntrinsicDataProperty(\n\
                     \x20   V8AtomicString(isolate, \"values\"), v8::kArrayProto_values);\n\
                     prototype_template->SetIntrinsicDataProperty(\n\
                     \x20   v8::Symbol::GetIterator(isolate), v8::kArrayProto_values);\n"
                        .to_string(),
                );
                out.template_extras.push(node);
            }
            _ => {
                ops.push(make_iteration_op(tree, "entries"));
                ops.push(make_iteration_op(tree, "keys"));
                ops.push(make_iteration_op(tree, "values"));
                ops.push(make_for_each_op(tree));
                iterator_symbol_target = Some("EntriesOperationCallback");
            }
        }
    }

    if let Some(maplike) = &ctx.interface.maplike {
        ops.push(make_iteration_op(tree, "entries"));
        ops.push(make_iteration_op(tree, "keys"));
        ops.push(make_iteration_op(tree, "values"));
        ops.push(make_for_each_op(tree));
        ops.push(make_keyed_op(
            tree,
            ctx,
            "get",
            vec![key_argument(&maplike.key_type)],
            false,
            true,
        )?);
        ops.push(make_keyed_op(
            tree,
            ctx,
            "has",
            vec![key_argument(&maplike.key_type)],
            false,
            true,
        )?);
        if !maplike.is_readonly {
            ops.push(make_keyed_op(
                tree,
                ctx,
                "set",
                vec![key_argument(&maplike.key_type), value_argument(&maplike.value_type, 1)],
                true,
                false,
            )?);
            ops.push(make_keyed_op(
                tree,
                ctx,
                "delete",
                vec![key_argument(&maplike.key_type)],
                false,
                true,
            )?);
            ops.push(make_keyed_op(tree, ctx, "clear", vec![], false, false)?);
        }
        has_size_attribute = true;
        iterator_symbol_target = Some("EntriesOperationCallback");
    }

    if let Some(setlike) = &ctx.interface.setlike {
        ops.push(make_iteration_op(tree, "entries"));
        ops.push(make_iteration_op(tree, "keys"));
        ops.push(make_iteration_op(tree, "values"));
        ops.push(make_for_each_op(tree));
        ops.push(make_keyed_op(
            tree,
            ctx,
            "has",
            vec![key_argument(&setlike.value_type)],
            false,
            true,
        )?);
        if !setlike.is_readonly {
            ops.push(make_keyed_op(
                tree,
                ctx,
                "add",
                vec![key_argument(&setlike.value_type)],
                true,
                false,
            )?);
            ops.push(make_keyed_op(
                tree,
                ctx,
                "delete",
                vec![key_argument(&setlike.value_type)],
                false,
                true,
            )?);
            ops.push(make_keyed_op(tree, ctx, "clear", vec![], false, false)?);
        }
        has_size_attribute = true;
        iterator_symbol_target = Some("ValuesOperationCallback");
    }

    if let Some(async_iterable) = &ctx.interface.async_iterable {
        let (names, alias): (&[&'static str], &'static str) =
            if async_iterable.key_type.is_some() {
                (&["entries", "keys", "values"], "EntriesOperationCallback")
            } else {
                (&["values"], "ValuesOperationCallback")
            };
        for name in names {
            ops.push(make_iteration_op(tree, name));
        }
        let node = tree.literal(format!(
            "prototype_template->Set(\n\
             \x20   v8::Symbol::GetAsyncIterator(isolate),\n\
             \x20   v8::FunctionTemplate::New(isolate, {alias}),\n\
             \x20   v8::DontEnum);\n"
        ));
        out.template_extras.push(node);
    }

    if ops.is_empty() && !has_size_attribute {
        return Ok(());
    }

    for op in ops {
        let def = make_callback_def(
            tree,
            ctx,
            &op.callback.clone(),
            op.name,
            "Operation",
            &empty,
            op.length,
            "_Method",
            vec![op.body],
        );
        out.callbacks.push(def);
        out.operations.push((
            Phase::Unconditional,
            Site::Prototype,
            Expr::True,
            format!("{{\"{}\", {}, {}, unsigned(v8::None)}}", op.name, op.callback, op.length),
        ));
    }

    if has_size_attribute {
        let body = common::text_with_symbols(
            tree,
            "auto&& return_value = ${blink_receiver}->size();\n\
             bindings::V8SetReturnValue(info, return_value);\n",
            &["blink_receiver"],
        );
        let def = make_callback_def(
            tree,
            ctx,
            "SizeAttributeGetCallback",
            "size",
            "AttributeGet",
            &empty,
            0,
            "_Getter",
            vec![body],
        );
        out.callbacks.push(def);
        out.attributes.push((
            Phase::Unconditional,
            Site::Prototype,
            Expr::True,
            "{\"size\", SizeAttributeGetCallback, nullptr, unsigned(v8::ReadOnly)}".to_string(),
        ));
    }

    if let Some(target) = iterator_symbol_target {
        let node = tree.literal(format!(
            "prototype_template->Set(\n\
             \x20   v8::Symbol::GetIterator(isolate),\n\
             \x20   v8::FunctionTemplate::New(isolate, {target}),\n\
             \x20   v8::DontEnum);\n"
        ));
        out.template_extras.push(node);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Indexed and named interceptors.

/// Test that decides whether the implementation reported "property absent".
fn absence_check(db: &Database, return_type: &IdlType) -> Option<String> {
    let unwrapped = return_type.unwrap(db, UnwrapFlags::typedefs_only());
    if unwrapped.is_string() {
        Some("return_value.IsNull()".to_string())
    } else if unwrapped.is_nullable() || unwrapped.is_interface(db) || unwrapped.is_any() {
        Some("!return_value".to_string())
    } else {
        None
    }
}

fn special_op_method<'a>(operation: &'a Operation, fallback: &'a str) -> &'a str {
    if operation.identifier.is_empty() {
        fallback
    } else {
        impl_property(&operation.ext_attrs, &operation.identifier)
    }
}

fn make_interceptor_func(
    tree: &mut CodeNodeTree,
    ctx: &Ctx<'_>,
    name: &str,
    params: &[String],
    return_type: &str,
    property_name: &str,
    exception_context: &str,
    body_nodes: Vec<NodeId>,
) -> NodeId {
    let func = cxx::func_def(tree, name, params, return_type, &FuncQuals::default());
    common::bind_callback_local_vars_with_receiver(
        tree,
        func.body,
        &ctx.class_name,
        &ctx.blink_class,
        &ctx.interface.identifier,
        property_name,
        exception_context,
    );
    for node in body_nodes {
        tree.append(func.body, node);
    }
    func.node
}

fn collect_interceptors(
    tree: &mut CodeNodeTree,
    ctx: &Ctx<'_>,
    out: &mut Collected,
) -> Result<(), GenerationError> {
    let Some(props) = &ctx.interface.indexed_and_named_properties else { return Ok(()) };
    if props.is_empty() {
        return Ok(());
    }
    let db = ctx.db();
    let mut install = String::new();

    if props.has_indexed_properties() {
        if let Some(getter) = &props.indexed_getter {
            let method = special_op_method(getter, "AnonymousIndexedGetter");
            let exc = if raises_exception(&getter.ext_attrs, None) {
                ", ${exception_state}"
            } else {
                ""
            };
            let mut text = format!(
                "auto&& return_value = ${{blink_receiver}}->{method}(index{exc});\n"
            );
            if !exc.is_empty() {
                text.push_str(
                    "if (${exception_state}.HadException()) [[unlikely]] {\n\
                     \x20 return v8::Intercepted::kYes;\n\
                     }\n",
                );
            }
            if let Some(check) = absence_check(db, &getter.return_type) {
                text.push_str(&format!(
                    "if ({check}) {{\n  return v8::Intercepted::kNo;\n}}\n"
                ));
            }
            let mut nodes = vec![common::text_with_symbols(
                tree,
                &text,
                &["blink_receiver", "exception_state"],
            )];
            if let Some(set) =
                common::make_v8_set_return_value(tree, db, &getter.return_type, "return_value")?
            {
                nodes.push(set);
            }
            let done = tree.literal("return v8::Intercepted::kYes;\n".to_string());
            nodes.push(done);
            let def = make_interceptor_func(
                tree,
                ctx,
                "IndexedPropertyGetterCallback",
                &[
                    "uint32_t index".to_string(),
                    "const v8::PropertyCallbackInfo<v8::Value>& info".to_string(),
                ],
                "v8::Intercepted",
                "",
                "IndexedGetter",
                nodes,
            );
            out.callbacks.push(def);

            let enumerator = tree.literal(format!(
                "void IndexedPropertyEnumeratorCallback(\n\
                 \x20   const v8::PropertyCallbackInfo<v8::Array>& info) {{\n\
                 \x20 v8::Isolate* isolate = info.GetIsolate();\n\
                 \x20 {blink}* blink_receiver =\n\
                 \x20     {v8}::ToWrappableUnsafe(isolate, info.This());\n\
                 \x20 bindings::V8SetReturnValue(\n\
                 \x20     info, bindings::EnumerateIndexedProperties(\n\
                 \x20               isolate, blink_receiver->length()));\n\
                 }}\n",
                blink = ctx.blink_class,
                v8 = ctx.class_name,
            ));
            out.callbacks.push(enumerator);
        }
        if let Some(setter) = &props.indexed_setter {
            let method = special_op_method(setter, "AnonymousIndexedSetter");
            let value_type = setter
                .arguments
                .last()
                .map(|a| &a.idl_type)
                .ok_or_else(|| {
                    GenerationError::invariant("indexed setter without a value argument", "<db>")
                })?;
            let tag = type_bridge::native_value_tag(db, value_type)?;
            let nodes = vec![common::text_with_symbols(
                tree,
                &format!(
                    "auto&& arg_value = NativeValueTraits<{tag}>::NativeValue(\n\
                     \x20   ${{isolate}}, v8_property_value, ${{exception_state}});\n\
                     if (${{exception_state}}.HadException()) [[unlikely]] {{\n\
                     \x20 return v8::Intercepted::kYes;\n\
                     }}\n\
                     ${{blink_receiver}}->{method}(index, arg_value, ${{exception_state}});\n\
                     if (${{exception_state}}.HadException()) [[unlikely]] {{\n\
                     \x20 return v8::Intercepted::kYes;\n\
                     }}\n\
                     return v8::Intercepted::kYes;\n"
                ),
                &["isolate", "exception_state", "blink_receiver"],
            )];
            let def = make_interceptor_func(
                tree,
                ctx,
                "IndexedPropertySetterCallback",
                &[
                    "uint32_t index".to_string(),
                    "v8::Local<v8::Value> v8_property_value".to_string(),
                    "const v8::PropertyCallbackInfo<void>& info".to_string(),
                ],
                "v8::Intercepted",
                "",
                "IndexedSetter",
                nodes,
            );
            out.callbacks.push(def);
        }
        // The definer refuses accessor descriptors; without an indexed setter
        // it refuses everything.
        let definer_tail = if props.indexed_setter.is_some() {
            "  return v8::Intercepted::kNo;\n"
        } else {
            "  ExceptionState exception_state(\n\
             \x20     info.GetIsolate(), v8::ExceptionContext::kIndexedSetter,\n\
             \x20     \"{idl}\", \"\");\n\
             \x20 exception_state.ThrowTypeError(\n\
             \x20     \"Index property setter is not supported.\");\n\
             \x20 return v8::Intercepted::kYes;\n"
        };
        let definer = tree.literal(format!(
            "v8::Intercepted IndexedPropertyDefinerCallback(\n\
             \x20   uint32_t index, const v8::PropertyDescriptor& v8_property_desc,\n\
             \x20   const v8::PropertyCallbackInfo<void>& info) {{\n\
             \x20 if (v8_property_desc.has_get() || v8_property_desc.has_set()) {{\n\
             \x20   ExceptionState exception_state(\n\
             \x20       info.GetIsolate(), v8::ExceptionContext::kIndexedSetter,\n\
             \x20       \"{idl}\", \"\");\n\
             \x20   exception_state.ThrowTypeError(\n\
             \x20       \"Accessor properties are not allowed to replace indexed \
             properties.\");\n\
             \x20   return v8::Intercepted::kYes;\n\
             \x20 }}\n\
             {definer_tail}\
             }}\n",
            idl = ctx.interface.identifier,
            definer_tail = definer_tail.replace("{idl}", &ctx.interface.identifier),
        ));
        out.callbacks.push(definer);

        if props.indexed_getter.is_some() {
            // [[Delete]] reports success only for unsupported indices; the
            // IDL has no indexed deleters.
            let deleter_nodes = vec![common::text_with_symbols(
                tree,
                "const bool is_supported = index < ${blink_receiver}->length();\n\
                 bindings::V8SetReturnValue(info, !is_supported);\n\
                 if (is_supported && info.ShouldThrowOnError()) {\n\
                 \x20 ${exception_state}.ThrowTypeError(\n\
                 \x20     \"Index property deleter is not supported.\");\n\
                 }\n\
                 return v8::Intercepted::kYes;\n",
                &["blink_receiver", "exception_state"],
            )];
            let deleter = make_interceptor_func(
                tree,
                ctx,
                "IndexedPropertyDeleterCallback",
                &[
                    "uint32_t index".to_string(),
                    "const v8::PropertyCallbackInfo<v8::Boolean>& info".to_string(),
                ],
                "v8::Intercepted",
                "",
                "IndexedDeleter",
                deleter_nodes,
            );
            out.callbacks.push(deleter);

            let descriptor = tree.literal(format!(
                "v8::Intercepted IndexedPropertyDescriptorCallback(\n\
                 \x20   uint32_t index, const v8::PropertyCallbackInfo<v8::Value>& info) {{\n\
                 \x20 if (IndexedPropertyGetterCallback(index, info) ==\n\
                 \x20     v8::Intercepted::kNo) {{\n\
                 \x20   return v8::Intercepted::kNo;\n\
                 \x20 }}\n\
                 \x20 v8::Local<v8::Value> v8_value = info.GetReturnValue().Get();\n\
                 \x20 if (v8_value->IsUndefined()) {{\n\
                 \x20   return v8::Intercepted::kNo;\n\
                 \x20 }}\n\
                 \x20 v8::PropertyDescriptor desc(v8_value, /*writable=*/{writable});\n\
                 \x20 desc.set_enumerable(true);\n\
                 \x20 desc.set_configurable(true);\n\
                 \x20 bindings::V8SetReturnValue(info, desc);\n\
                 \x20 return v8::Intercepted::kYes;\n\
                 }}\n",
                writable = if props.indexed_setter.is_some() { "true" } else { "false" },
            ));
            out.callbacks.push(descriptor);
        }

        install.push_str(&format!(
            "{{\n\
             \x20 v8::IndexedPropertyHandlerConfiguration config(\n\
             \x20     {getter},\n\
             \x20     {setter},\n\
             \x20     nullptr,  // query\n\
             \x20     {deleter},\n\
             \x20     {enumerator},\n\
             \x20     IndexedPropertyDefinerCallback,\n\
             \x20     {descriptor},\n\
             \x20     v8::Local<v8::Value>(),\n\
             \x20     v8::PropertyHandlerFlags::kNone);\n\
             \x20 instance_template->SetHandler(config);\n\
             }}\n",
            getter = if props.indexed_getter.is_some() {
                "IndexedPropertyGetterCallback"
            } else {
                "nullptr"
            },
            setter = if props.indexed_setter.is_some() {
                "IndexedPropertySetterCallback"
            } else {
                "nullptr"
            },
            deleter = if props.indexed_getter.is_some() {
                "IndexedPropertyDeleterCallback"
            } else {
                "nullptr"
            },
            enumerator = if props.indexed_getter.is_some() {
                "IndexedPropertyEnumeratorCallback"
            } else {
                "nullptr"
            },
            descriptor = if props.indexed_getter.is_some() {
                "IndexedPropertyDescriptorCallback"
            } else {
                "nullptr"
            },
        ));
    }

    if props.has_named_properties() {
        if let Some(getter) = &props.named_getter {
            let method = special_op_method(getter, "AnonymousNamedGetter");
            let exc = if raises_exception(&getter.ext_attrs, None) {
                ", ${exception_state}"
            } else {
                ""
            };
            let mut text = String::from(
                "if (!v8_property_name->IsString()) {\n\
                 \x20 return v8::Intercepted::kNo;\n\
                 }\n\
                 AtomicString property_name =\n\
                 \x20   ToCoreAtomicString(${isolate}, v8_property_name.As<v8::String>());\n",
            );
            text.push_str(&format!(
                "auto&& return_value = ${{blink_receiver}}->{method}(property_name{exc});\n"
            ));
            if !exc.is_empty() {
                text.push_str(
                    "if (${exception_state}.HadException()) [[unlikely]] {\n\
                     \x20 return v8::Intercepted::kYes;\n\
                     }\n",
                );
            }
            if let Some(check) = absence_check(db, &getter.return_type) {
                text.push_str(&format!(
                    "if ({check}) {{\n  return v8::Intercepted::kNo;\n}}\n"
                ));
            }
            let mut nodes = vec![common::text_with_symbols(
                tree,
                &text,
                &["isolate", "blink_receiver", "exception_state"],
            )];
            if let Some(set) =
                common::make_v8_set_return_value(tree, db, &getter.return_type, "return_value")?
            {
                nodes.push(set);
            }
            let done = tree.literal("return v8::Intercepted::kYes;\n".to_string());
            nodes.push(done);
            let def = make_interceptor_func(
                tree,
                ctx,
                "NamedPropertyGetterCallback",
                &[
                    "v8::Local<v8::Name> v8_property_name".to_string(),
                    "const v8::PropertyCallbackInfo<v8::Value>& info".to_string(),
                ],
                "v8::Intercepted",
                "",
                "NamedGetter",
                nodes,
            );
            out.callbacks.push(def);

            let enumerator_nodes = vec![common::text_with_symbols(
                tree,
                "Vector<String> blink_property_names;\n\
                 ${blink_receiver}->NamedPropertyEnumerator(\n\
                 \x20   blink_property_names, ${exception_state});\n\
                 if (${exception_state}.HadException()) [[unlikely]] {\n\
                 \x20 return;\n\
                 }\n\
                 bindings::V8SetReturnValue(\n\
                 \x20   info, ToV8Traits<IDLSequence<IDLString>>::ToV8(\n\
                 \x20             ${script_state}, blink_property_names));\n",
                &["blink_receiver", "exception_state", "script_state"],
            )];
            let def = make_interceptor_func(
                tree,
                ctx,
                "NamedPropertyEnumeratorCallback",
                &["const v8::PropertyCallbackInfo<v8::Array>& info".to_string()],
                "void",
                "",
                "NamedGetter",
                enumerator_nodes,
            );
            out.callbacks.push(def);
        }
        if let Some(setter) = &props.named_setter {
            let method = special_op_method(setter, "AnonymousNamedSetter");
            let value_type = setter
                .arguments
                .last()
                .map(|a| &a.idl_type)
                .ok_or_else(|| {
                    GenerationError::invariant("named setter without a value argument", "<db>")
                })?;
            let tag = type_bridge::native_value_tag(db, value_type)?;
            let nodes = vec![common::text_with_symbols(
                tree,
                &format!(
                    "if (!v8_property_name->IsString()) {{\n\
                     \x20 return v8::Intercepted::kNo;\n\
                     }}\n\
                     AtomicString property_name =\n\
                     \x20   ToCoreAtomicString(${{isolate}}, \
                     v8_property_name.As<v8::String>());\n\
                     auto&& arg_value = NativeValueTraits<{tag}>::NativeValue(\n\
                     \x20   ${{isolate}}, v8_property_value, ${{exception_state}});\n\
                     if (${{exception_state}}.HadException()) [[unlikely]] {{\n\
                     \x20 return v8::Intercepted::kYes;\n\
                     }}\n\
                     ${{blink_receiver}}->{method}(property_name, arg_value, \
                     ${{exception_state}});\n\
                     if (${{exception_state}}.HadException()) [[unlikely]] {{\n\
                     \x20 return v8::Intercepted::kYes;\n\
                     }}\n\
                     return v8::Intercepted::kYes;\n"
                ),
                &["isolate", "exception_state", "blink_receiver"],
            )];
            let def = make_interceptor_func(
                tree,
                ctx,
                "NamedPropertySetterCallback",
                &[
                    "v8::Local<v8::Name> v8_property_name".to_string(),
                    "v8::Local<v8::Value> v8_property_value".to_string(),
                    "const v8::PropertyCallbackInfo<void>& info".to_string(),
                ],
                "v8::Intercepted",
                "",
                "NamedSetter",
                nodes,
            );
            out.callbacks.push(def);

            let definer = tree.literal(format!(
                "v8::Intercepted NamedPropertyDefinerCallback(\n\
                 \x20   v8::Local<v8::Name> v8_property_name,\n\
                 \x20   const v8::PropertyDescriptor& v8_property_desc,\n\
                 \x20   const v8::PropertyCallbackInfo<void>& info) {{\n\
                 \x20 if (v8_property_desc.has_get() || v8_property_desc.has_set()) {{\n\
                 \x20   ExceptionState exception_state(\n\
                 \x20       info.GetIsolate(), v8::ExceptionContext::kNamedSetter,\n\
                 \x20       \"{idl}\", \"\");\n\
                 \x20   exception_state.ThrowTypeError(\n\
                 \x20       \"Accessor properties are not allowed to replace named \
                 properties.\");\n\
                 \x20   return v8::Intercepted::kYes;\n\
                 \x20 }}\n\
                 \x20 return v8::Intercepted::kNo;\n\
                 }}\n",
                idl = ctx.interface.identifier,
            ));
            out.callbacks.push(definer);
        }
        if let Some(deleter) = &props.named_deleter {
            let method = special_op_method(deleter, "AnonymousNamedDeleter");
            let exc = if raises_exception(&deleter.ext_attrs, None) {
                ", ${exception_state}"
            } else {
                ""
            };
            let mut text = String::from(
                "if (!v8_property_name->IsString()) {\n\
                 \x20 return v8::Intercepted::kNo;\n\
                 }\n\
                 AtomicString property_name =\n\
                 \x20   ToCoreAtomicString(${isolate}, v8_property_name.As<v8::String>());\n",
            );
            text.push_str(&format!(
                "auto&& did_delete = ${{blink_receiver}}->{method}(property_name{exc});\n"
            ));
            if !exc.is_empty() {
                text.push_str(
                    "if (${exception_state}.HadException()) [[unlikely]] {\n\
                     \x20 return v8::Intercepted::kYes;\n\
                     }\n",
                );
            }
            text.push_str(
                "bindings::V8SetReturnValue(info, did_delete);\n\
                 return v8::Intercepted::kYes;\n",
            );
            let nodes = vec![common::text_with_symbols(
                tree,
                &text,
                &["isolate", "blink_receiver", "exception_state"],
            )];
            let def = make_interceptor_func(
                tree,
                ctx,
                "NamedPropertyDeleterCallback",
                &[
                    "v8::Local<v8::Name> v8_property_name".to_string(),
                    "const v8::PropertyCallbackInfo<v8::Boolean>& info".to_string(),
                ],
                "v8::Intercepted",
                "",
                "NamedDeleter",
                nodes,
            );
            out.callbacks.push(def);
        }

        if let Some(getter) = &props.named_getter {
            // LegacyPlatformObjectGetOwnProperty: a property visible on the
            // prototype chain is not intercepted unless
            // [LegacyOverrideBuiltIns] masks it.
            let visibility_check = if ctx.interface.ext_attrs.has("LegacyOverrideBuiltIns") {
                ""
            } else {
                "if (${v8_receiver}->GetRealNamedPropertyAttributesInPrototypeChain(\n\
                 \x20       ${current_context}, v8_property_name).IsJust()) {\n\
                 \x20 return v8::Intercepted::kNo;\n\
                 }\n"
            };
            let descriptor_nodes = vec![common::text_with_symbols(
                tree,
                &format!(
                    "{visibility_check}\
                     if (NamedPropertyGetterCallback(v8_property_name, info) ==\n\
                     \x20   v8::Intercepted::kNo) {{\n\
                     \x20 return v8::Intercepted::kNo;\n\
                     }}\n\
                     v8::Local<v8::Value> v8_value = info.GetReturnValue().Get();\n\
                     if (v8_value->IsUndefined()) {{\n\
                     \x20 return v8::Intercepted::kNo;\n\
                     }}\n\
                     v8::PropertyDescriptor desc(v8_value, /*writable=*/{writable});\n\
                     desc.set_enumerable({enumerable});\n\
                     desc.set_configurable(true);\n\
                     bindings::V8SetReturnValue(info, desc);\n\
                     return v8::Intercepted::kYes;\n",
                    writable = if props.named_setter.is_some() { "true" } else { "false" },
                    enumerable =
                        if getter.ext_attrs.has("NotEnumerable") { "false" } else { "true" },
                ),
                &["v8_receiver", "current_context"],
            )];
            let descriptor = make_interceptor_func(
                tree,
                ctx,
                "NamedPropertyDescriptorCallback",
                &[
                    "v8::Local<v8::Name> v8_property_name".to_string(),
                    "const v8::PropertyCallbackInfo<v8::Value>& info".to_string(),
                ],
                "v8::Intercepted",
                "",
                "NamedDescriptor",
                descriptor_nodes,
            );
            out.callbacks.push(descriptor);

            if !getter.ext_attrs.has("NotEnumerable") {
                let attr = if props.named_setter.is_some() { "v8::None" } else { "v8::ReadOnly" };
                let query_nodes = vec![common::text_with_symbols(
                    tree,
                    &format!(
                        "if (!v8_property_name->IsString()) {{\n\
                         \x20 return v8::Intercepted::kNo;\n\
                         }}\n\
                         AtomicString property_name =\n\
                         \x20   ToCoreAtomicString(${{isolate}}, \
                         v8_property_name.As<v8::String>());\n\
                         bool does_exist = ${{blink_receiver}}->NamedPropertyQuery(\n\
                         \x20   property_name, ${{exception_state}});\n\
                         if (${{exception_state}}.HadException()) [[unlikely]] {{\n\
                         \x20 return v8::Intercepted::kYes;\n\
                         }}\n\
                         if (!does_exist) {{\n\
                         \x20 return v8::Intercepted::kNo;\n\
                         }}\n\
                         bindings::V8SetReturnValue(info, uint32_t({attr}));\n\
                         return v8::Intercepted::kYes;\n"
                    ),
                    &["isolate", "blink_receiver", "exception_state"],
                )];
                let query = make_interceptor_func(
                    tree,
                    ctx,
                    "NamedPropertyQueryCallback",
                    &[
                        "v8::Local<v8::Name> v8_property_name".to_string(),
                        "const v8::PropertyCallbackInfo<v8::Integer>& info".to_string(),
                    ],
                    "v8::Intercepted",
                    "",
                    "NamedQuery",
                    query_nodes,
                );
                out.callbacks.push(query);
            }
        }

        let flags = if ctx.interface.ext_attrs.has("LegacyOverrideBuiltIns") {
            "v8::PropertyHandlerFlags::kOnlyInterceptStrings".to_string()
        } else {
            "static_cast<v8::PropertyHandlerFlags>(\n\
             \x20       static_cast<int>(v8::PropertyHandlerFlags::kOnlyInterceptStrings) |\n\
             \x20       static_cast<int>(v8::PropertyHandlerFlags::kNonMasking))"
                .to_string()
        };
        let named_getter_enumerable = props
            .named_getter
            .as_ref()
            .is_some_and(|getter| !getter.ext_attrs.has("NotEnumerable"));
        install.push_str(&format!(
            "{{\n\
             \x20 v8::NamedPropertyHandlerConfiguration config(\n\
             \x20     {getter},\n\
             \x20     {setter},\n\
             \x20     {query},\n\
             \x20     {deleter},\n\
             \x20     {enumerator},\n\
             \x20     {definer},\n\
             \x20     {descriptor},\n\
             \x20     v8::Local<v8::Value>(),\n\
             \x20     {flags});\n\
             \x20 instance_template->SetHandler(config);\n\
             }}\n",
            getter = if props.named_getter.is_some() {
                "NamedPropertyGetterCallback"
            } else {
                "nullptr"
            },
            setter = if props.named_setter.is_some() {
                "NamedPropertySetterCallback"
            } else {
                "nullptr"
            },
            query = if named_getter_enumerable {
                "NamedPropertyQueryCallback"
            } else {
                "nullptr"
            },
            deleter = if props.named_deleter.is_some() {
                "NamedPropertyDeleterCallback"
            } else {
                "nullptr"
            },
            enumerator = if props.named_getter.is_some() {
                "NamedPropertyEnumeratorCallback"
            } else {
                "nullptr"
            },
            definer = if props.named_setter.is_some() {
                "NamedPropertyDefinerCallback"
            } else {
                "nullptr"
            },
            descriptor = if props.named_getter.is_some() {
                "NamedPropertyDescriptorCallback"
            } else {
                "nullptr"
            },
        ));
    }

    let node = tree.literal(install);
    out.template_extras.push(node);
    Ok(())
}

// ---------------------------------------------------------------------------
// Cross-origin property tables and the access check.

fn collect_cross_origin_support(
    tree: &mut CodeNodeTree,
    ctx: &Ctx<'_>,
    out: &mut Collected,
) {
    let needs_access_check = ctx.interface.ext_attrs.value_of("CheckSecurity")
        == Some("Receiver")
        || !out.cross_origin_attribute_rows.is_empty()
        || !out.cross_origin_operation_rows.is_empty();
    if !needs_access_check {
        return;
    }
    let check = tree.literal(
        "bool SecurityCheckCallback(v8::Local<v8::Context> accessing_context,\n\
         \x20                       v8::Local<v8::Object> accessed_object,\n\
         \x20                       v8::Local<v8::Value> data) {\n\
         \x20 return BindingSecurity::ShouldAllowAccessToV8Context(accessing_context,\n\
         \x20                                                      accessed_object);\n\
         }\n"
            .to_string(),
    );
    tree.accumulate(
        check,
        include("third_party/blink/renderer/bindings/core/v8/binding_security.h"),
    );
    out.callbacks.push(check);

    let mut install = String::new();
    let attr_span = if out.cross_origin_attribute_rows.is_empty() {
        "base::span<const bindings::CrossOriginAttributeConfig>()".to_string()
    } else {
        install.push_str(&format!(
            "static const bindings::CrossOriginAttributeConfig \
             kCrossOriginAttributeTable[] = {{\n    {},\n}};\n",
            out.cross_origin_attribute_rows.join(",\n    "),
        ));
        "kCrossOriginAttributeTable".to_string()
    };
    let op_span = if out.cross_origin_operation_rows.is_empty() {
        "base::span<const bindings::CrossOriginOperationConfig>()".to_string()
    } else {
        install.push_str(&format!(
            "static const bindings::CrossOriginOperationConfig \
             kCrossOriginOperationTable[] = {{\n    {},\n}};\n",
            out.cross_origin_operation_rows.join(",\n    "),
        ));
        "kCrossOriginOperationTable".to_string()
    };
    install.push_str(&format!(
        "bindings::InstallCrossOriginAccessCheck(\n\
         \x20   isolate, instance_template, SecurityCheckCallback,\n\
         \x20   {attr_span},\n\
         \x20   {op_span});\n"
    ));
    let node = tree.literal(install);
    out.template_extras.push(node);
}

// ---------------------------------------------------------------------------
// Header.

fn make_header_class(
    tree: &mut CodeNodeTree,
    body: NodeId,
    ctx: &Ctx<'_>,
    has_context_install: bool,
    cross_component: bool,
) {
    tree.accumulate(
        body,
        include("third_party/blink/renderer/platform/bindings/wrapper_type_info.h"),
    );
    tree.accumulate(
        body,
        include("third_party/blink/renderer/platform/bindings/v8_interface_bridge_base.h"),
    );
    source_file::add_common_includes(tree, body);
    tree.accumulate(body, crate::codegen::accumulator::AccumulatorOp::ClassDecl(
        ctx.blink_class.clone(),
    ));

    let class = cxx::class_def(
        tree,
        &cxx::ClassSpec {
            name: &ctx.class_name,
            base_names: &[],
            is_final: true,
            export: Some(common::component_export(ctx.target.api_component)),
            ..cxx::ClassSpec::default()
        },
    );

    let decls = tree.literal(format!(
        "  {class_name}() = delete;\n\n\
         \x20 static {blink}* ToWrappable(v8::Isolate* isolate,\n\
         \x20                             v8::Local<v8::Value> value);\n\
         \x20 static {blink}* ToWrappableUnsafe(v8::Isolate* isolate,\n\
         \x20                                   v8::Local<v8::Object> wrapper);\n\
         \x20 static bool HasInstance(v8::Isolate* isolate, v8::Local<v8::Value> value);\n\n",
        class_name = ctx.class_name,
        blink = ctx.blink_class,
    ));
    tree.append(class.public_section, decls);

    let wti = common::wrapper_type_info_decls(tree);
    tree.append(class.public_section, wti);

    let install = tree.literal(
        "\n\
         \x20 static void InstallInterfaceTemplate(\n\
         \x20     v8::Isolate* isolate,\n\
         \x20     const DOMWrapperWorld& world,\n\
         \x20     v8::Local<v8::Template> interface_template);\n\
         \x20 static void InstallUnconditionalProperties(\n\
         \x20     v8::Isolate* isolate,\n\
         \x20     const DOMWrapperWorld& world,\n\
         \x20     v8::Local<v8::Template> instance_template,\n\
         \x20     v8::Local<v8::Template> prototype_template,\n\
         \x20     v8::Local<v8::Template> interface_template);\n\
         \x20 static void InstallContextIndependentProperties(\n\
         \x20     v8::Isolate* isolate,\n\
         \x20     const DOMWrapperWorld& world,\n\
         \x20     v8::Local<v8::Template> instance_template,\n\
         \x20     v8::Local<v8::Template> prototype_template,\n\
         \x20     v8::Local<v8::Template> interface_template);\n"
            .to_string(),
    );
    tree.append(class.public_section, install);

    if has_context_install {
        let install_context = tree.literal(
            "  static void InstallContextDependentProperties(\n\
             \x20     ScriptState* script_state,\n\
             \x20     const DOMWrapperWorld& world,\n\
             \x20     v8::Local<v8::Object> instance_object,\n\
             \x20     v8::Local<v8::Object> prototype_object,\n\
             \x20     v8::Local<v8::Object> interface_object,\n\
             \x20     v8::Local<v8::Template> interface_template,\n\
             \x20     bindings::V8InterfaceBridgeBase::FeatureSelector feature_selector);\n"
                .to_string(),
        );
        tree.append(class.public_section, install_context);
    }

    if cross_component {
        let impl_export = common::component_export(ctx.target.impl_component);
        let impl_class = tree.literal(format!(
            "\n\
             \x20 class {impl_export} Impl final {{\n\
             \x20  public:\n\
             \x20   static void Init();\n\
             \x20 }};\n"
        ));
        tree.append(class.public_section, impl_class);
        let pointer = tree.literal(
            "  static void (*install_context_dependent_props_func_)(\n\
             \x20     ScriptState* script_state,\n\
             \x20     const DOMWrapperWorld& world,\n\
             \x20     v8::Local<v8::Object> instance_object,\n\
             \x20     v8::Local<v8::Object> prototype_object,\n\
             \x20     v8::Local<v8::Object> interface_object,\n\
             \x20     v8::Local<v8::Template> interface_template,\n\
             \x20     bindings::V8InterfaceBridgeBase::FeatureSelector feature_selector);\n"
                .to_string(),
        );
        tree.append(class.private_section, pointer);
    }

    tree.append(body, class.node);
}

// ---------------------------------------------------------------------------
// Source assembly.

const INSTALLER_TEMPLATE_ARGS: [&str; 5] = [
    "v8::Isolate* isolate",
    "const DOMWrapperWorld& world",
    "v8::Local<v8::Template> instance_template",
    "v8::Local<v8::Template> prototype_template",
    "v8::Local<v8::Template> interface_template",
];

const INSTALLER_CONTEXT_ARGS: [&str; 7] = [
    "ScriptState* script_state",
    "const DOMWrapperWorld& world",
    "v8::Local<v8::Object> instance_object",
    "v8::Local<v8::Object> prototype_object",
    "v8::Local<v8::Object> interface_object",
    "v8::Local<v8::Template> interface_template",
    "bindings::V8InterfaceBridgeBase::FeatureSelector feature_selector",
];

fn template_table_spec(
    kind: &str,
    table_var: &'static str,
    site: Site,
) -> common::TableSpec<'static> {
    let install_call = match (kind, site) {
        ("attr", Site::Instance) => {
            "bindings::InstallAttributes(isolate, world, instance_template, \
             v8::Local<v8::Template>(), v8::Local<v8::Template>(), {table});"
        }
        ("attr", Site::Prototype) => {
            "bindings::InstallAttributes(isolate, world, v8::Local<v8::Template>(), \
             prototype_template, v8::Local<v8::Template>(), {table});"
        }
        ("attr", Site::Interface) => {
            "bindings::InstallAttributes(isolate, world, v8::Local<v8::Template>(), \
             v8::Local<v8::Template>(), interface_template, {table});"
        }
        ("op", Site::Instance) => {
            "bindings::InstallOperations(isolate, world, instance_template, \
             v8::Local<v8::Template>(), v8::Local<v8::Template>(), {table});"
        }
        ("op", Site::Prototype) => {
            "bindings::InstallOperations(isolate, world, v8::Local<v8::Template>(), \
             prototype_template, v8::Local<v8::Template>(), {table});"
        }
        _ => {
            "bindings::InstallOperations(isolate, world, v8::Local<v8::Template>(), \
             v8::Local<v8::Template>(), interface_template, {table});"
        }
    };
    common::TableSpec {
        entry_type: if kind == "attr" {
            "bindings::AttributeConfig"
        } else {
            "bindings::OperationConfig"
        },
        table_var,
        install_call,
    }
}

fn context_table_spec(
    kind: &str,
    table_var: &'static str,
    site: Site,
) -> common::TableSpec<'static> {
    let install_call = match (kind, site) {
        ("attr", Site::Instance) => {
            "bindings::InstallAttributes(isolate, world, instance_object, \
             v8::Local<v8::Object>(), v8::Local<v8::Object>(), {table});"
        }
        ("attr", Site::Prototype) => {
            "bindings::InstallAttributes(isolate, world, v8::Local<v8::Object>(), \
             prototype_object, v8::Local<v8::Object>(), {table});"
        }
        ("attr", Site::Interface) => {
            "bindings::InstallAttributes(isolate, world, v8::Local<v8::Object>(), \
             v8::Local<v8::Object>(), interface_object, {table});"
        }
        ("op", Site::Instance) => {
            "bindings::InstallOperations(isolate, world, instance_object, \
             v8::Local<v8::Object>(), v8::Local<v8::Object>(), {table});"
        }
        ("op", Site::Prototype) => {
            "bindings::InstallOperations(isolate, world, v8::Local<v8::Object>(), \
             prototype_object, v8::Local<v8::Object>(), {table});"
        }
        _ => {
            "bindings::InstallOperations(isolate, world, v8::Local<v8::Object>(), \
             v8::Local<v8::Object>(), interface_object, {table});"
        }
    };
    common::TableSpec {
        entry_type: if kind == "attr" {
            "bindings::AttributeConfig"
        } else {
            "bindings::OperationConfig"
        },
        table_var,
        install_call,
    }
}

const SITE_TABLES: [(Site, &str, &str); 3] = [
    (Site::Instance, "kInstanceAttributeTable", "kInstanceOperationTable"),
    (Site::Prototype, "kAttributeTable", "kOperationTable"),
    (Site::Interface, "kStaticAttributeTable", "kStaticOperationTable"),
];

fn emit_phase_tables(
    tree: &mut CodeNodeTree,
    body: NodeId,
    collected: &Collected,
    phase: Phase,
    on_objects: bool,
) {
    for (site, attr_table, op_table) in SITE_TABLES {
        let entries = Collected::entries(&collected.attributes, phase, site);
        let spec = if on_objects {
            context_table_spec("attr", attr_table, site)
        } else {
            template_table_spec("attr", attr_table, site)
        };
        common::install_entries_grouped(tree, body, &spec, entries);

        let entries = Collected::entries(&collected.operations, phase, site);
        let spec = if on_objects {
            context_table_spec("op", op_table, site)
        } else {
            template_table_spec("op", op_table, site)
        };
        common::install_entries_grouped(tree, body, &spec, entries);
    }

    let constants: Vec<common::InstallEntry> = collected
        .constants
        .iter()
        .filter(|(p, ..)| *p == phase)
        .map(|(_, expr, text)| common::InstallEntry {
            exposure: expr.clone(),
            entry_text: text.clone(),
        })
        .collect();
    common::install_entries_grouped(
        tree,
        body,
        &common::TableSpec {
            entry_type: "bindings::ConstantConfig",
            table_var: "kConstantTable",
            install_call: if on_objects {
                "bindings::InstallConstants(isolate, prototype_object, interface_object, \
                 {table});"
            } else {
                "bindings::InstallConstants(isolate, prototype_template, interface_template, \
                 {table});"
            },
        },
        constants,
    );

    let constructs: Vec<common::InstallEntry> = collected
        .exposed_constructs
        .iter()
        .filter(|(p, ..)| *p == phase)
        .map(|(_, expr, text)| common::InstallEntry {
            exposure: expr.clone(),
            entry_text: text.clone(),
        })
        .collect();
    common::install_entries_grouped(
        tree,
        body,
        &common::TableSpec {
            entry_type: "bindings::ExposedConstructConfig",
            table_var: "kExposedConstructTable",
            install_call: if on_objects {
                "bindings::InstallExposedConstructs(isolate, world, instance_object, {table});"
            } else {
                "bindings::InstallExposedConstructs(isolate, world, instance_template, \
                 {table});"
            },
        },
        constructs,
    );
}

fn emit_per_world_tables(tree: &mut CodeNodeTree, body: NodeId, collected: &Collected) {
    if collected.main_world_attributes.is_empty() {
        return;
    }
    let to_entries = |rows: &[(Site, Expr, String)], site: Site| -> Vec<common::InstallEntry> {
        rows.iter()
            .filter(|(s, ..)| *s == site)
            .map(|(_, expr, text)| common::InstallEntry {
                exposure: expr.clone(),
                entry_text: text.clone(),
            })
            .collect()
    };
    let main_seq = tree.sequence(vec![]);
    let other_seq = tree.sequence(vec![]);
    for (site, attr_table, _) in SITE_TABLES {
        common::install_entries_grouped(
            tree,
            main_seq,
            &template_table_spec("attr", attr_table, site),
            to_entries(&collected.main_world_attributes, site),
        );
        common::install_entries_grouped(
            tree,
            other_seq,
            &template_table_spec("attr", attr_table, site),
            to_entries(&collected.other_world_attributes, site),
        );
    }
    let branch = cxx::if_else(
        tree,
        "world.IsMainWorld()",
        vec![main_seq],
        Likeliness::Always,
        vec![other_seq],
        Likeliness::Always,
    );
    tree.append(body, branch);
}

fn wrapper_type_info_node(
    tree: &mut CodeNodeTree,
    ctx: &Ctx<'_>,
    has_context_install: bool,
) -> NodeId {
    let parent = ctx
        .interface
        .inherited
        .as_deref()
        .map(|p| format!("V8{p}::GetWrapperTypeInfo()"));
    let is_node = ctx.interface.identifier == "Node"
        || ctx.interface.does_inherit_from(ctx.db(), "Node");
    common::wrapper_type_info_def(
        tree,
        &common::WrapperTypeInfoSpec {
            class_name: &ctx.class_name,
            idl_name: &ctx.interface.identifier,
            parent: parent.as_deref(),
            kind: common::IdlDefinitionKind::Interface,
            has_prototype: true,
            is_node,
            is_active_script_wrappable: ctx.interface.ext_attrs.has("ActiveScriptWrappable"),
            has_context_dependent_properties: has_context_install,
            skipped_in_interface_object_prototype_chain: ctx
                .interface
                .ext_attrs
                .has("LegacyNoInterfaceObject"),
        },
    )
}

fn add_source_includes(tree: &mut CodeNodeTree, body: NodeId, ctx: &Ctx<'_>) {
    tree.accumulate(
        body,
        include("third_party/blink/renderer/bindings/core/v8/native_value_traits_impl.h"),
    );
    tree.accumulate(
        body,
        include("third_party/blink/renderer/bindings/core/v8/to_v8_traits.h"),
    );
    tree.accumulate(
        body,
        include("third_party/blink/renderer/platform/bindings/v8_set_return_value.h"),
    );
    tree.accumulate(
        body,
        include("third_party/blink/renderer/platform/bindings/v8_per_isolate_data.h"),
    );
    for header in &ctx.interface.code_generator_info.blink_headers {
        tree.accumulate(body, include(header));
    }
    if let Some(parent) = ctx.interface.inherited.as_deref() {
        if let Some(parent_interface) = ctx.db().find_interface(parent) {
            let parent_target =
                TargetPaths::bindings(parent, &parent_interface.code_generator_info);
            tree.accumulate(
                body,
                include(ctx.env.paths.include_path(
                    parent_target.api_component,
                    &parent_target.basename,
                    "h",
                )),
            );
        }
    }
}

fn make_wrappable_defs(tree: &mut CodeNodeTree, ctx: &Ctx<'_>) -> NodeId {
    tree.literal(format!(
        "// static\n\
         {blink}* {class}::ToWrappable(v8::Isolate* isolate,\n\
         \x20                          v8::Local<v8::Value> value) {{\n\
         \x20 return HasInstance(isolate, value)\n\
         \x20            ? ToWrappableUnsafe(isolate, value.As<v8::Object>())\n\
         \x20            : nullptr;\n\
         }}\n\n\
         // static\n\
         {blink}* {class}::ToWrappableUnsafe(v8::Isolate* isolate,\n\
         \x20                                v8::Local<v8::Object> wrapper) {{\n\
         \x20 return ToScriptWrappable<{blink}>(isolate, wrapper);\n\
         }}\n\n\
         // static\n\
         bool {class}::HasInstance(v8::Isolate* isolate, v8::Local<v8::Value> value) {{\n\
         \x20 return V8PerIsolateData::From(isolate)->HasInstance(GetWrapperTypeInfo(),\n\
         \x20                                                     value);\n\
         }}\n",
        blink = ctx.blink_class,
        class = ctx.class_name,
    ))
}

fn emit_source(
    tree: &mut CodeNodeTree,
    body: NodeId,
    ctx: &Ctx<'_>,
    collected: Collected,
    cross_component: bool,
) -> Result<(), GenerationError> {
    add_source_includes(tree, body, ctx);

    let has_context_install = cross_component || collected.has_context_dependent();

    let anon = cxx::namespace(tree, "", collected.callbacks.clone());
    tree.append(body, anon);

    let wti = wrapper_type_info_node(tree, ctx, has_context_install);
    tree.append(body, wti);

    let wrappable = make_wrappable_defs(tree, ctx);
    tree.append(body, wrappable);

    // InstallInterfaceTemplate.
    let install = cxx::func_def(
        tree,
        &format!("{}::InstallInterfaceTemplate", ctx.class_name),
        &[
            "v8::Isolate* isolate".to_string(),
            "const DOMWrapperWorld& world".to_string(),
            "v8::Local<v8::Template> interface_template".to_string(),
        ],
        "\n// static\nvoid",
        &FuncQuals::default(),
    );
    let setup = tree.literal(format!(
        "bindings::SetupIDLInterfaceTemplate(\n\
         \x20   isolate, {}::GetWrapperTypeInfo(),\n\
         \x20   interface_template.As<v8::FunctionTemplate>());\n\n",
        ctx.class_name,
    ));
    tree.append(install.body, setup);
    let needs_locals = collected.constructor.is_some() || !collected.template_extras.is_empty();
    if needs_locals {
        let locals = tree.literal(
            "v8::Local<v8::FunctionTemplate> interface_function_template =\n\
             \x20   interface_template.As<v8::FunctionTemplate>();\n\
             v8::Local<v8::ObjectTemplate> instance_template =\n\
             \x20   interface_function_template->InstanceTemplate();\n\
             v8::Local<v8::ObjectTemplate> prototype_template =\n\
             \x20   interface_function_template->PrototypeTemplate();\n\n"
                .to_string(),
        );
        tree.append(install.body, locals);
    }
    if let Some((callback, length)) = &collected.constructor {
        let ctor = tree.literal(format!(
            "interface_function_template->SetCallHandler({callback});\n\
             interface_function_template->SetLength({length});\n\n"
        ));
        tree.append(install.body, ctor);
    }
    for extra in &collected.template_extras {
        tree.append(install.body, *extra);
    }
    let quartet_calls = tree.literal(
        "\nInstallUnconditionalProperties(isolate, world, instance_template,\n\
         \x20                              prototype_template, interface_template);\n\
         InstallContextIndependentProperties(isolate, world, instance_template,\n\
         \x20                                   prototype_template, interface_template);\n"
            .to_string(),
    );
    tree.append(install.body, quartet_calls);
    tree.append(body, install.node);

    // InstallUnconditionalProperties.
    let unconditional = cxx::func_def(
        tree,
        &format!("{}::InstallUnconditionalProperties", ctx.class_name),
        &INSTALLER_TEMPLATE_ARGS.map(String::from),
        "\n// static\nvoid",
        &FuncQuals::default(),
    );
    emit_phase_tables(tree, unconditional.body, &collected, Phase::Unconditional, false);
    emit_per_world_tables(tree, unconditional.body, &collected);
    tree.append(body, unconditional.node);

    // InstallContextIndependentProperties.
    let independent = cxx::func_def(
        tree,
        &format!("{}::InstallContextIndependentProperties", ctx.class_name),
        &INSTALLER_TEMPLATE_ARGS.map(String::from),
        "\n// static\nvoid",
        &FuncQuals::default(),
    );
    emit_phase_tables(
        tree,
        independent.body,
        &collected,
        Phase::ContextIndependent,
        false,
    );
    tree.append(body, independent.node);

    if cross_component {
        let pointer = tree.literal(format!(
            "\nvoid (*{class}::install_context_dependent_props_func_)(\n\
             \x20   ScriptState*,\n\
             \x20   const DOMWrapperWorld&,\n\
             \x20   v8::Local<v8::Object>,\n\
             \x20   v8::Local<v8::Object>,\n\
             \x20   v8::Local<v8::Object>,\n\
             \x20   v8::Local<v8::Template>,\n\
             \x20   bindings::V8InterfaceBridgeBase::FeatureSelector) = nullptr;\n",
            class = ctx.class_name,
        ));
        tree.append(body, pointer);
        let trampoline = tree.literal(format!(
            "\n// static\n\
             void {class}::InstallContextDependentProperties(\n\
             \x20   ScriptState* script_state,\n\
             \x20   const DOMWrapperWorld& world,\n\
             \x20   v8::Local<v8::Object> instance_object,\n\
             \x20   v8::Local<v8::Object> prototype_object,\n\
             \x20   v8::Local<v8::Object> interface_object,\n\
             \x20   v8::Local<v8::Template> interface_template,\n\
             \x20   bindings::V8InterfaceBridgeBase::FeatureSelector feature_selector) {{\n\
             \x20 if (install_context_dependent_props_func_) {{\n\
             \x20   install_context_dependent_props_func_(\n\
             \x20       script_state, world, instance_object, prototype_object,\n\
             \x20       interface_object, interface_template, feature_selector);\n\
             \x20 }}\n\
             }}\n",
            class = ctx.class_name,
        ));
        tree.append(body, trampoline);
    } else if has_context_install {
        let dependent = cxx::func_def(
            tree,
            &format!("{}::InstallContextDependentProperties", ctx.class_name),
            &INSTALLER_CONTEXT_ARGS.map(String::from),
            "\n// static\nvoid",
            &FuncQuals::default(),
        );
        emit_context_installer_body(tree, dependent.body, ctx, &collected);
        tree.append(body, dependent.node);
    }
    Ok(())
}

fn emit_context_installer_body(
    tree: &mut CodeNodeTree,
    body: NodeId,
    ctx: &Ctx<'_>,
    collected: &Collected,
) {
    common::bind_installer_local_vars(tree, body, &global_names(ctx.interface));
    let isolate =
        tree.literal("v8::Isolate* isolate = script_state->GetIsolate();\n\n".to_string());
    tree.append(body, isolate);
    emit_phase_tables(tree, body, collected, Phase::ContextDependent, true);
    for extra in &collected.context_extras {
        tree.append(body, *extra);
    }
}

fn emit_impl_source(
    tree: &mut CodeNodeTree,
    body: NodeId,
    ctx: &Ctx<'_>,
    collected: Collected,
) -> Result<(), GenerationError> {
    add_source_includes(tree, body, ctx);

    let mut anon_nodes = collected.callbacks.clone();
    let installer = cxx::func_def(
        tree,
        "InstallContextDependentPropertiesImpl",
        &INSTALLER_CONTEXT_ARGS.map(String::from),
        "void",
        &FuncQuals::default(),
    );
    emit_context_installer_body(tree, installer.body, ctx, &collected);
    anon_nodes.push(installer.node);
    let anon = cxx::namespace(tree, "", anon_nodes);
    tree.append(body, anon);

    let init = tree.literal(format!(
        "\n// static\n\
         void {class}::Impl::Init() {{\n\
         \x20 {class}::install_context_dependent_props_func_ =\n\
         \x20     InstallContextDependentPropertiesImpl;\n\
         }}\n",
        class = ctx.class_name,
    ));
    tree.append(body, init);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::package_initializer::{GenOptions, PackageInitializer};
    use crate::codegen::path_manager::PathConfig;
    use std::sync::Arc;
    use web_idl::{
        Component, Constant, Constructor, Database, ExposedConstruct, Exposure,
        IndexedAndNamedProperties, Maplike, StringKind,
    };

    fn blank_interface(identifier: &str) -> Interface {
        Interface {
            identifier: identifier.to_string(),
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
            ext_attrs: ExtendedAttributes::new(),
            exposure: Exposure::default(),
            code_generator_info: Default::default(),
            debug_info: Default::default(),
        }
    }

    fn long_type() -> IdlType {
        IdlType::new(TypeKind::Integer(IntegerKind::Long))
    }

    fn attribute(identifier: &str, idl_type: IdlType, is_readonly: bool) -> Attribute {
        Attribute {
            identifier: identifier.to_string(),
            idl_type,
            is_static: false,
            is_readonly,
            ext_attrs: ExtendedAttributes::new(),
            exposure: Exposure::default(),
            code_generator_info: Default::default(),
            debug_info: Default::default(),
        }
    }

    fn operation(identifier: &str, arguments: Vec<Argument>, return_type: IdlType) -> Operation {
        Operation {
            identifier: identifier.to_string(),
            arguments,
            return_type,
            is_static: false,
            special_kind: Default::default(),
            ext_attrs: ExtendedAttributes::new(),
            exposure: Exposure::default(),
            code_generator_info: Default::default(),
            debug_info: Default::default(),
        }
    }

    fn argument(identifier: &str, idl_type: IdlType, index: usize) -> Argument {
        Argument {
            identifier: identifier.to_string(),
            idl_type,
            index,
            is_optional: false,
            default_value: None,
        }
    }

    fn env_with(interfaces: Vec<Interface>) -> Arc<RuntimeEnv> {
        let mut db = Database::default();
        for interface in interfaces {
            db.add_interface(interface);
        }
        PackageInitializer::new(
            Arc::new(db),
            PathConfig::chromium_default("/out/gen"),
            GenOptions::default(),
        )
        .init()
    }

    #[test]
    fn readonly_attribute_installs_on_the_prototype() {
        let mut interface = blank_interface("X");
        interface.attributes.push(attribute("n", long_type(), true));
        let env = env_with(vec![interface]);
        let files = generate_interface(&env, "X").unwrap();
        assert_eq!(files.len(), 2);
        let header = &files[0].content;
        assert!(header.contains("class CORE_EXPORT V8X final {"));
        assert!(!header.contains("InstallContextDependentProperties"));
        let source = &files[1].content;
        assert!(source.contains("void NAttributeGetCallback("));
        assert!(source.contains("blink_receiver->n()"));
        assert!(source.contains("bindings::V8SetReturnValue(info, return_value);"));
        assert!(source
            .contains("{\"n\", NAttributeGetCallback, nullptr, unsigned(v8::ReadOnly)}"));
        assert!(source.contains("static const bindings::AttributeConfig kAttributeTable[]"));
        assert!(source.contains("WrapperTypeInfo::kIdlInterface"));
    }

    #[test]
    fn writable_attribute_gets_a_setter_callback() {
        let mut interface = blank_interface("X");
        interface.attributes.push(attribute(
            "label",
            IdlType::new(TypeKind::String(StringKind::DomString)),
            false,
        ));
        let env = env_with(vec![interface]);
        let files = generate_interface(&env, "X").unwrap();
        let source = &files[1].content;
        assert!(source.contains("void LabelAttributeSetCallback("));
        assert!(source.contains("blink_receiver->setLabel(arg0_label);"));
        assert!(source.contains(
            "{\"label\", LabelAttributeGetCallback, LabelAttributeSetCallback, \
             unsigned(v8::None)}"
        ));
    }

    #[test]
    fn constructor_checks_construct_call_and_wraps() {
        let mut interface = blank_interface("X");
        interface.constructor_groups.push(ConstructorGroup {
            identifier: String::new(),
            constructors: vec![Constructor {
                arguments: vec![argument("count", long_type(), 0)],
                ext_attrs: ExtendedAttributes::new(),
                exposure: Exposure::default(),
                debug_info: Default::default(),
            }],
            ext_attrs: ExtendedAttributes::new(),
            exposure: Exposure::default(),
        });
        let env = env_with(vec![interface]);
        let files = generate_interface(&env, "X").unwrap();
        let source = &files[1].content;
        assert!(source.contains("if (!info.IsConstructCall()) [[unlikely]] {"));
        assert!(source.contains("ExceptionMessages::ConstructorCalledAsFunction()"));
        assert!(source.contains("X* blink_instance = X::Create(arg0_count);"));
        assert!(source.contains("blink_instance->AssociateWithWrapper("));
        assert!(source.contains("interface_function_template->SetCallHandler(ConstructorCallback);"));
        assert!(source.contains("interface_function_template->SetLength(1);"));
    }

    #[test]
    fn no_alloc_direct_call_overloads_build_a_fast_table() {
        let mut interface = blank_interface("X");
        let mut fast_one_arg = operation(
            "f",
            vec![argument("a", long_type(), 0)],
            IdlType::new(TypeKind::Undefined),
        );
        fast_one_arg.ext_attrs.insert("NoAllocDirectCall", vec![]);
        let mut enforce_range_type = long_type();
        enforce_range_type.ext_attrs.insert("EnforceRange", vec![]);
        let mut fast_optional = operation(
            "f",
            vec![
                Argument {
                    identifier: "a".to_string(),
                    idl_type: enforce_range_type,
                    index: 0,
                    is_optional: true,
                    default_value: None,
                },
                Argument {
                    identifier: "b".to_string(),
                    idl_type: long_type(),
                    index: 1,
                    is_optional: true,
                    default_value: None,
                },
            ],
            IdlType::new(TypeKind::Undefined),
        );
        fast_optional.ext_attrs.insert("NoAllocDirectCall", vec![]);
        interface.operation_groups.push(OperationGroup {
            identifier: "f".to_string(),
            operations: vec![
                operation(
                    "f",
                    vec![argument("node", IdlType::reference("Node"), 0)],
                    IdlType::new(TypeKind::Undefined),
                ),
                fast_one_arg,
                fast_optional,
            ],
            ext_attrs: ExtendedAttributes::new(),
            exposure: Exposure::default(),
        });
        let env = env_with(vec![interface, blank_interface("Node")]);
        let files = generate_interface(&env, "X").unwrap();
        let source = &files[1].content;
        assert!(source.contains("void FOverload1Callback("));
        assert!(source.contains("void FOverload2Arg1Callback("));
        assert!(source.contains("void FOverload3Arg0Callback("));
        assert!(source.contains("void FOverload3Arg2Callback("));
        assert!(source.contains("void FOverloadDispatcher("));
        assert!(source.contains("kNoAllocDirectCallOverloadsOfF"));
        assert!(source.contains("#if !defined(ARCH_CPU_X86)"));
        assert!(source.contains("v8::CFunctionBuilder().Fn(FOverload2Arg1Callback).Build(),"));
        assert!(source.contains("bindings::InstallNoAllocDirectCallOperation("));
    }

    #[test]
    fn checked_return_value_getter_wraps_in_the_target_realm() {
        let mut interface = blank_interface("X");
        let mut content_document =
            attribute("contentDocument", IdlType::reference("Document"), true);
        content_document
            .ext_attrs
            .insert("CheckSecurity", vec!["ReturnValue".to_string()]);
        interface.attributes.push(content_document);
        let env = env_with(vec![interface, blank_interface("Document")]);
        let files = generate_interface(&env, "X").unwrap();
        let source = &files[1].content;
        assert!(source.contains("BindingSecurity::ShouldAllowAccessTo("));
        assert!(source.contains("WebFeature::kCrossOriginXContentDocument"));
        assert!(source.contains("bindings::V8SetReturnValueNull(info);"));
        assert!(source.contains("ToScriptState(return_value->GetFrame(), script_state->World())"));
    }

    #[test]
    fn named_getter_generates_interceptors() {
        let mut interface = blank_interface("X");
        let mut named_getter = operation(
            "",
            vec![argument("name", IdlType::new(TypeKind::String(StringKind::DomString)), 0)],
            IdlType::new(TypeKind::String(StringKind::DomString)),
        );
        named_getter.special_kind = web_idl::SpecialOperationKind::NamedGetter;
        interface.indexed_and_named_properties = Some(IndexedAndNamedProperties {
            named_getter: Some(named_getter),
            ..Default::default()
        });
        let env = env_with(vec![interface]);
        let files = generate_interface(&env, "X").unwrap();
        let source = &files[1].content;
        assert!(source.contains("v8::Intercepted NamedPropertyGetterCallback("));
        assert!(source.contains("blink_receiver->AnonymousNamedGetter(property_name)"));
        assert!(source.contains("return v8::Intercepted::kNo;"));
        assert!(source.contains("kNonMasking"));
        assert!(source.contains("instance_template->SetHandler(config);"));
        assert!(source.contains("NamedPropertyEnumeratorCallback"));
        // Every named trap: getter, query, descriptor; setter/definer are
        // absent so their slots stay null.
        assert!(source.contains("v8::Intercepted NamedPropertyQueryCallback("));
        assert!(source.contains("blink_receiver->NamedPropertyQuery("));
        assert!(source.contains("uint32_t(v8::ReadOnly)"));
        assert!(source.contains("v8::Intercepted NamedPropertyDescriptorCallback("));
        assert!(source.contains("GetRealNamedPropertyAttributesInPrototypeChain("));
        assert!(source.contains("v8::PropertyDescriptor desc(v8_value, /*writable=*/false);"));
        let config_at = source.find("v8::NamedPropertyHandlerConfiguration config(").unwrap();
        let config = &source[config_at..source[config_at..].find(';').unwrap() + config_at];
        assert!(config.contains("NamedPropertyQueryCallback"));
        assert!(config.contains("NamedPropertyDescriptorCallback"));
    }

    #[test]
    fn indexed_getter_generates_deleter_and_descriptor_traps() {
        let mut interface = blank_interface("X");
        let mut indexed_getter = operation(
            "",
            vec![argument("index", IdlType::new(TypeKind::Integer(IntegerKind::UnsignedLong)), 0)],
            IdlType::new(TypeKind::String(StringKind::DomString)),
        );
        indexed_getter.special_kind = web_idl::SpecialOperationKind::IndexedGetter;
        interface.indexed_and_named_properties = Some(IndexedAndNamedProperties {
            indexed_getter: Some(indexed_getter),
            ..Default::default()
        });
        let env = env_with(vec![interface]);
        let files = generate_interface(&env, "X").unwrap();
        let source = &files[1].content;
        assert!(source.contains("v8::Intercepted IndexedPropertyDeleterCallback("));
        assert!(source.contains("\"Index property deleter is not supported.\""));
        assert!(source.contains("v8::Intercepted IndexedPropertyDescriptorCallback("));
        // No indexed setter, so the descriptor is read-only.
        assert!(source.contains("v8::PropertyDescriptor desc(v8_value, /*writable=*/false);"));
        let config_at = source.find("v8::IndexedPropertyHandlerConfiguration config(").unwrap();
        let config = &source[config_at..source[config_at..].find(';').unwrap() + config_at];
        assert!(config.contains("IndexedPropertyDeleterCallback"));
        assert!(config.contains("IndexedPropertyDescriptorCallback"));
        assert!(config.contains("nullptr,  // query"));
    }

    #[test]
    fn maplike_installs_iteration_methods() {
        let mut interface = blank_interface("X");
        interface.maplike = Some(Maplike {
            key_type: IdlType::new(TypeKind::String(StringKind::DomString)),
            value_type: long_type(),
            is_readonly: true,
        });
        let env = env_with(vec![interface]);
        let files = generate_interface(&env, "X").unwrap();
        let source = &files[1].content;
        assert!(source.contains("blink_receiver->entriesForBinding(script_state, exception_state)"));
        assert!(source.contains("blink_receiver->getForBinding("));
        assert!(source.contains("blink_receiver->hasForBinding("));
        assert!(!source.contains("setForBinding"));
        assert!(source.contains("v8::Symbol::GetIterator(isolate)"));
        assert!(source.contains("EntriesOperationCallback"));
        assert!(source
            .contains("{\"size\", SizeAttributeGetCallback, nullptr, unsigned(v8::ReadOnly)}"));
    }

    #[test]
    fn runtime_enabled_constant_guards_in_template_phase() {
        let mut interface = blank_interface("X");
        let mut constant = Constant {
            identifier: "FLAG".to_string(),
            idl_type: long_type(),
            value_literal: "0x2".to_string(),
            ext_attrs: ExtendedAttributes::new(),
            exposure: Exposure::default(),
            debug_info: Default::default(),
        };
        constant.exposure.runtime_enabled_features.push("FancyFlags".to_string());
        interface.constants.push(constant);
        let env = env_with(vec![interface]);
        let files = generate_interface(&env, "X").unwrap();
        let source = &files[1].content;
        assert!(source.contains("InstallContextIndependentProperties"));
        assert!(source.contains("if (RuntimeEnabledFeatures::FancyFlagsEnabled()) {"));
        assert!(source.contains("{\"FLAG\", static_cast<int32_t>(0x2)}"));
    }

    #[test]
    fn cross_component_interface_routes_through_impl_init() {
        let mut interface = blank_interface("X");
        interface.code_generator_info.component = Component::Core;
        interface.code_generator_info.component_of_partial = Some(Component::Modules);
        let mut gated = attribute("gadget", long_type(), true);
        gated.exposure.origin_trial_features.push("GadgetTrial".to_string());
        interface.attributes.push(gated);
        let env = env_with(vec![interface]);
        let files = generate_interface(&env, "X").unwrap();
        assert_eq!(files.len(), 3);
        let header = &files[0].content;
        assert!(header.contains("class MODULES_EXPORT Impl final {"));
        assert!(header.contains("install_context_dependent_props_func_"));
        let api_source = &files[1].content;
        assert!(api_source.contains("if (install_context_dependent_props_func_) {"));
        let impl_source = &files[2].content;
        assert!(impl_source.contains("void V8X::Impl::Init() {"));
        assert!(impl_source.contains(
            "V8X::install_context_dependent_props_func_ =\n      \
             InstallContextDependentPropertiesImpl;"
        ));
        assert!(impl_source.contains("GadgetAttributeGetCallback"));
    }

    #[test]
    fn global_interface_installs_exposed_constructs() {
        let mut interface = blank_interface("TestGlobal");
        interface.ext_attrs.insert("Global", vec!["TestGlobal".to_string()]);
        interface.exposed_constructs.push(ExposedConstruct {
            identifier: "Gadget".to_string(),
            ext_attrs: ExtendedAttributes::new(),
            exposure: Exposure::default(),
            debug_info: Default::default(),
        });
        let env = env_with(vec![interface, blank_interface("Gadget")]);
        let files = generate_interface(&env, "TestGlobal").unwrap();
        let source = &files[1].content;
        assert!(source.contains("void GadgetExposedConstructCallback("));
        assert!(source.contains("V8Gadget::GetWrapperTypeInfo()"));
        assert!(source.contains("bindings::V8ReturnValue::kInterfaceObject"));
        assert!(source.contains("kExposedConstructTable"));
        assert!(source.contains("bindings::InstallExposedConstructs("));
    }

    #[test]
    fn per_world_bindings_split_the_attribute_table() {
        let mut interface = blank_interface("X");
        let mut per_world = attribute("n", long_type(), true);
        per_world.ext_attrs.insert("PerWorldBindings", vec![]);
        interface.attributes.push(per_world);
        let env = env_with(vec![interface]);
        let files = generate_interface(&env, "X").unwrap();
        let source = &files[1].content;
        assert!(source.contains("void NAttributeGetCallbackForMainWorld("));
        assert!(source.contains("if (world.IsMainWorld()) {"));
        assert!(source.contains("{\"n\", NAttributeGetCallbackForMainWorld, nullptr"));
        assert!(source.contains("{\"n\", NAttributeGetCallback, nullptr"));
    }

    #[test]
    fn legacy_factory_function_installs_on_the_global() {
        let mut interface = blank_interface("HTMLImageElement");
        interface.legacy_factory_function_groups.push(ConstructorGroup {
            identifier: "Image".to_string(),
            constructors: vec![Constructor {
                arguments: vec![],
                ext_attrs: ExtendedAttributes::new(),
                exposure: Exposure::default(),
                debug_info: Default::default(),
            }],
            ext_attrs: ExtendedAttributes::new(),
            exposure: Exposure::default(),
        });
        let env = env_with(vec![interface]);
        let files = generate_interface(&env, "HTMLImageElement").unwrap();
        let header = &files[0].content;
        assert!(header.contains("InstallContextDependentProperties"));
        let source = &files[1].content;
        assert!(source.contains("void ImageLegacyFactoryFunctionCallback("));
        assert!(source.contains("legacy_factory_function->SetName(V8AtomicString(isolate, \"Image\"));"));
        assert!(source.contains("CreateDataProperty"));
    }

    #[test]
    fn mixins_produce_no_output() {
        let mut interface = blank_interface("GeometryUtils");
        interface.is_mixin = true;
        let env = env_with(vec![interface]);
        let files = generate_interface(&env, "GeometryUtils").unwrap();
        assert!(files.is_empty());
    }
}
