//! End-to-end compilation tests over small authored graphs.

use std::sync::Arc;

use morph_codegen::{CompiledProgram, Compiler, CompilerOptions, RootOp};
use morph_diagnostic::{MessageContext, Severity, SpamBin};
use morph_graph::{
    CellValue, ColumnType, ComponentNew, ComponentNode, ComponentNodeRef, GroupType, LayoutNode,
    LayoutNodeRef, LodNode, MeshNode, ModifierGating, ModifierKind, ModifierNode, ModifierStage,
    Node, ObjectGroup, ObjectNew, ObjectNode, ObjectNodeRef, ScalarNode, ScalarNodeRef,
    SourceLayoutBlock, StateDesc, SurfaceChannel, SurfaceNew, SurfaceNode, SurfaceNodeRef,
    SwitchNode, Table, TableNode, VariationBranch, VariationNode,
};
use morph_ir::{
    BoolOp, ColorOp, Image, ImageFormat, ImageOp, InstanceOp, InstanceOpRef, Mesh,
    MeshLayoutFlags, MeshOp, PackStrategy, Real, ReductionMethod, ScalarOp,
};

fn ctx() -> MessageContext {
    MessageContext::none()
}

fn scalar_const(value: f32) -> ScalarNodeRef {
    Arc::new(ScalarNode::Constant { value })
}

fn mesh_payload(seed: u8) -> Arc<Mesh> {
    Arc::new(Mesh::new(4, 6, 1, vec![seed; 12]))
}

fn layout_node() -> LayoutNodeRef {
    Arc::new(LayoutNode {
        grid: [4, 4],
        max_grid: [8, 8],
        strategy: PackStrategy::Resizable,
        reduction: ReductionMethod::Halve,
        blocks: vec![SourceLayoutBlock {
            min: [0, 0],
            size: [4, 4],
            priority: 0,
            reduce_both_axes: false,
            reduce_by_two: false,
        }],
    })
}

fn bare_surface(name: &str, tags: &[&str]) -> SurfaceNew {
    SurfaceNew {
        name: name.to_owned(),
        surface_id: 1,
        shared_surface_id: None,
        mesh: None,
        images: Vec::new(),
        vectors: Vec::new(),
        scalars: Vec::new(),
        strings: Vec::new(),
        tags: tags.iter().map(|&t| t.to_owned()).collect(),
        context: ctx(),
    }
}

fn component_of(id: u16, surfaces: Vec<SurfaceNodeRef>) -> ComponentNodeRef {
    Arc::new(ComponentNode::New(ComponentNew {
        id,
        lods: vec![Arc::new(LodNode { surfaces })],
        context: ctx(),
    }))
}

fn object_of(components: Vec<ComponentNodeRef>) -> ObjectNodeRef {
    Arc::new(ObjectNode::New(ObjectNew {
        name: "Root".to_owned(),
        uid: String::new(),
        components,
        modifiers: Vec::new(),
        children: Vec::new(),
        states: Vec::new(),
        extension_data: Vec::new(),
        context: ctx(),
    }))
}

fn compile(root: Node) -> CompiledProgram {
    Compiler::new(CompilerOptions::new())
        .compile(&root)
        .unwrap_or_else(|error| panic!("compile failed: {error}"))
}

fn root_instance(program: &CompiledProgram) -> InstanceOpRef {
    match &program.states[0].root {
        Some(RootOp::Instance(op)) => Arc::clone(op),
        other => panic!("expected an instance root, got {other:?}"),
    }
}

/// Collect every AddSurface op reachable from an instance root.
fn collect_surfaces(op: &InstanceOpRef, out: &mut Vec<InstanceOpRef>) {
    match &**op {
        InstanceOp::AddSurface { instance, .. } => {
            out.push(Arc::clone(op));
            if let Some(instance) = instance {
                collect_surfaces(instance, out);
            }
        }
        InstanceOp::AddComponent { instance, component, .. } => {
            if let Some(instance) = instance {
                collect_surfaces(instance, out);
            }
            if let Some(component) = component {
                collect_surfaces(component, out);
            }
        }
        InstanceOp::AddLod { lods } => {
            for lod in lods.iter().flatten() {
                collect_surfaces(lod, out);
            }
        }
        InstanceOp::AddExtensionData { instance, .. } => {
            if let Some(instance) = instance {
                collect_surfaces(instance, out);
            }
        }
        InstanceOp::Conditional(conditional) => {
            if let Some(yes) = &conditional.yes {
                collect_surfaces(yes, out);
            }
            if let Some(no) = &conditional.no {
                collect_surfaces(no, out);
            }
        }
        InstanceOp::Switch(switch) => {
            for case in &switch.cases {
                if let Some(branch) = &case.branch {
                    collect_surfaces(branch, out);
                }
            }
            if let Some(default) = &switch.default {
                collect_surfaces(default, out);
            }
        }
    }
}

/// Collect every conditional guarding part of the instance chain.
fn collect_conditionals(op: &InstanceOpRef, out: &mut Vec<InstanceOpRef>) {
    match &**op {
        InstanceOp::Conditional(conditional) => {
            out.push(Arc::clone(op));
            if let Some(yes) = &conditional.yes {
                collect_conditionals(yes, out);
            }
            if let Some(no) = &conditional.no {
                collect_conditionals(no, out);
            }
        }
        InstanceOp::AddComponent { instance, component, .. } => {
            if let Some(instance) = instance {
                collect_conditionals(instance, out);
            }
            if let Some(component) = component {
                collect_conditionals(component, out);
            }
        }
        InstanceOp::AddSurface { instance, .. }
        | InstanceOp::AddExtensionData { instance, .. } => {
            if let Some(instance) = instance {
                collect_conditionals(instance, out);
            }
        }
        InstanceOp::AddLod { lods } => {
            for lod in lods.iter().flatten() {
                collect_conditionals(lod, out);
            }
        }
        InstanceOp::Switch(switch) => {
            for case in &switch.cases {
                if let Some(branch) = &case.branch {
                    collect_conditionals(branch, out);
                }
            }
        }
    }
}

#[test]
fn zero_states_synthesize_a_default() {
    let root = object_of(vec![component_of(0, vec![])]);
    let program = compile(Node::Object(root));
    assert_eq!(program.states.len(), 1);
    assert_eq!(program.states[0].descriptor.name, "Default");
}

#[test]
fn declared_states_each_get_a_root() {
    let object = Arc::new(ObjectNode::New(ObjectNew {
        name: "Root".to_owned(),
        uid: String::new(),
        components: vec![component_of(0, vec![Arc::new(SurfaceNode::New(bare_surface(
            "Body",
            &[],
        )))])],
        modifiers: Vec::new(),
        children: Vec::new(),
        states: vec![StateDesc::new("Menu"), StateDesc::new("InGame")],
        extension_data: Vec::new(),
        context: ctx(),
    }));
    let program = compile(Node::Object(object));
    assert_eq!(program.states.len(), 2);
    assert_eq!(program.states[0].descriptor.name, "Menu");
    assert_eq!(program.states[1].descriptor.name, "InGame");
    assert!(program.states.iter().all(|state| state.root.is_some()));
}

#[test]
fn oversized_runtime_parameter_lists_warn() {
    let mut state = StateDesc::new("Heavy");
    state.runtime_params = (0..65).map(|i| format!("param{i}")).collect();
    let object = Arc::new(ObjectNode::New(ObjectNew {
        name: "Root".to_owned(),
        uid: String::new(),
        components: vec![],
        modifiers: vec![],
        children: vec![],
        states: vec![state],
        extension_data: vec![],
        context: ctx(),
    }));
    let program = compile(Node::Object(object));
    assert_eq!(program.diagnostics.count(Severity::Warning), 1);
}

#[test]
fn always_one_group_shares_one_selector_across_children() {
    let children: Vec<ObjectNodeRef> = (0..3)
        .map(|i| {
            Arc::new(ObjectNode::New(ObjectNew {
                name: format!("Choice{i}"),
                uid: String::new(),
                components: vec![component_of(i, vec![Arc::new(SurfaceNode::New(
                    bare_surface("S", &[]),
                ))])],
                modifiers: vec![],
                children: vec![],
                states: vec![],
                extension_data: vec![],
                context: ctx(),
            }))
        })
        .collect();
    let group = Arc::new(ObjectNode::Group(ObjectGroup {
        name: "Outfit".to_owned(),
        uid: String::new(),
        group_type: GroupType::AlwaysOne,
        default_value: String::new(),
        children,
        context: ctx(),
    }));

    let program = compile(Node::Object(group));
    let root = root_instance(&program);

    let mut conditionals = Vec::new();
    collect_conditionals(&root, &mut conditionals);
    let mut selector: Option<morph_ir::ScalarOpRef> = None;
    let mut values = Vec::new();
    for conditional in &conditionals {
        let InstanceOp::Conditional(c) = &**conditional else { unreachable!() };
        if let BoolOp::EnumEquals { selector: s, value } = &*c.condition {
            values.push(*value);
            match &selector {
                Some(existing) => assert!(Arc::ptr_eq(existing, s)),
                None => selector = Some(Arc::clone(s)),
            }
        }
    }
    values.sort_unstable();
    assert_eq!(values, vec![0, 1, 2]);

    let selector = selector.unwrap_or_else(|| panic!("no group selector found"));
    let ScalarOp::Parameter(param) = &*selector else {
        panic!("group selector should be a parameter");
    };
    assert_eq!(param.param.options.len(), 3);
    assert_eq!(param.param.name, "Outfit");
}

#[test]
fn toggle_group_with_group_child_reports_an_error() {
    let inner = Arc::new(ObjectNode::Group(ObjectGroup {
        name: "Inner".to_owned(),
        uid: String::new(),
        group_type: GroupType::AlwaysAll,
        default_value: String::new(),
        children: vec![],
        context: ctx(),
    }));
    let group = Arc::new(ObjectNode::Group(ObjectGroup {
        name: "Toggles".to_owned(),
        uid: String::new(),
        group_type: GroupType::ToggleEach,
        default_value: String::new(),
        children: vec![inner],
        context: ctx(),
    }));
    let program = compile(Node::Object(group));
    assert_eq!(program.diagnostics.count(Severity::Error), 1);
    let entries = program.diagnostics.entries();
    assert!(entries[0].message.contains("toggle group"));
}

#[test]
fn scalar_switch_without_options_degrades_to_one() {
    let switch = Arc::new(ScalarNode::Switch(SwitchNode {
        parameter: None,
        options: Vec::new(),
        context: ctx(),
    }));
    let program = compile(Node::Scalar(switch));
    assert_eq!(program.diagnostics.count(Severity::Error), 1);
    match &program.states[0].root {
        Some(RootOp::Scalar(op)) => {
            assert_eq!(**op, ScalarOp::Constant(Real(1.0)));
        }
        other => panic!("expected a scalar root, got {other:?}"),
    }
}

#[test]
fn color_table_with_unknown_column_reports_once_and_degrades() {
    let mut table = Table::new("palette");
    table.add_column("Size", ColumnType::Scalar).ok();
    table.add_row(1).ok();
    let node = Arc::new(morph_graph::ColorNode::Table(TableNode {
        table: Arc::new(table),
        column: "Tint".to_owned(),
        parameter_name: "Row".to_owned(),
        add_none_option: false,
        default_row_name: String::new(),
        context: ctx(),
    }));
    let program = compile(Node::Color(node));
    assert_eq!(program.diagnostics.count(Severity::Error), 1);
    match &program.states[0].root {
        Some(RootOp::Color(op)) => assert!(matches!(&**op, ColorOp::Constant(_))),
        other => panic!("expected a color root, got {other:?}"),
    }
}

#[test]
fn mesh_variation_with_unknown_tag_warns_and_skips() {
    let variation = Arc::new(MeshNode::Variation(VariationNode {
        default_value: Some(Arc::new(MeshNode::Constant {
            mesh: mesh_payload(1),
            layouts: vec![],
            context: ctx(),
        })),
        variations: vec![VariationBranch {
            tag: "Foo".to_owned(),
            value: Some(Arc::new(MeshNode::Constant {
                mesh: mesh_payload(2),
                layouts: vec![],
                context: ctx(),
            })),
        }],
        context: ctx(),
    }));
    let program = compile(Node::Mesh(variation));

    let warnings: Vec<_> = program
        .diagnostics
        .entries()
        .into_iter()
        .filter(|d| d.severity == Severity::Warning)
        .collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].bin, SpamBin::UnknownTag);

    // The branch was skipped entirely: no conditional in the result.
    match &program.states[0].root {
        Some(RootOp::Mesh(op)) => assert!(matches!(&**op, MeshOp::Constant { .. })),
        other => panic!("expected a mesh root, got {other:?}"),
    }
}

#[test]
fn variation_fold_lets_the_last_declared_branch_win() {
    let variation = Arc::new(ScalarNode::Variation(VariationNode {
        default_value: Some(scalar_const(0.0)),
        variations: vec![
            VariationBranch {
                tag: "A".to_owned(),
                value: Some(scalar_const(1.0)),
            },
            VariationBranch {
                tag: "B".to_owned(),
                value: Some(scalar_const(2.0)),
            },
        ],
        context: ctx(),
    }));
    let mut surface = bare_surface("Body", &["A", "B"]);
    surface.scalars.push(SurfaceChannel {
        name: "Factor".to_owned(),
        node: Some(variation),
    });
    let root = object_of(vec![component_of(0, vec![Arc::new(SurfaceNode::New(surface))])]);
    let program = compile(Node::Object(root));

    let mut surfaces = Vec::new();
    collect_surfaces(&root_instance(&program), &mut surfaces);
    assert_eq!(surfaces.len(), 1);
    let InstanceOp::AddSurface { scalars, .. } = &*surfaces[0] else { unreachable!() };

    // Outermost conditional is the last declared branch (B): it wins
    // when both tags are active. With neither active the default shows.
    let ScalarOp::Conditional(outer) = &*scalars[0].op else {
        panic!("expected the variation to lower to a conditional");
    };
    assert_eq!(
        outer.yes.as_deref(),
        Some(&ScalarOp::Constant(Real(2.0)))
    );
    let Some(inner) = outer.no.as_deref() else { panic!("missing inner arm") };
    let ScalarOp::Conditional(inner) = inner else {
        panic!("expected a nested conditional for the first branch");
    };
    assert_eq!(inner.yes.as_deref(), Some(&ScalarOp::Constant(Real(1.0))));
    assert_eq!(inner.no.as_deref(), Some(&ScalarOp::Constant(Real(0.0))));
}

#[test]
fn repeated_references_hit_the_cache_and_share_ops() {
    let shared = Arc::new(ScalarNode::Parameter(morph_graph::ScalarParameter {
        name: "Strength".to_owned(),
        uid: "0123456789abcdef0123456789abcdef".to_owned(),
        default: 0.5,
        ranges: vec![],
        context: ctx(),
    }));
    let mut surface = bare_surface("Body", &[]);
    surface.scalars.push(SurfaceChannel {
        name: "First".to_owned(),
        node: Some(Arc::clone(&shared)),
    });
    surface.scalars.push(SurfaceChannel {
        name: "Second".to_owned(),
        node: Some(shared),
    });
    let root = object_of(vec![component_of(0, vec![Arc::new(SurfaceNode::New(surface))])]);
    let program = compile(Node::Object(root));

    let mut surfaces = Vec::new();
    collect_surfaces(&root_instance(&program), &mut surfaces);
    let InstanceOp::AddSurface { scalars, .. } = &*surfaces[0] else { unreachable!() };
    assert!(Arc::ptr_eq(&scalars[0].op, &scalars[1].op));
}

#[test]
fn table_selector_is_shared_across_domains() {
    let mut table = Table::new("wardrobe");
    table.add_column("Name", ColumnType::String).ok();
    table.add_column("Tint", ColumnType::Color).ok();
    table.add_column("Size", ColumnType::Scalar).ok();
    table.add_row(1).ok();
    table.add_row(2).ok();
    table.set_cell(1, "Name", CellValue::String("Short".to_owned())).ok();
    table.set_cell(2, "Name", CellValue::String("Long".to_owned())).ok();
    let table = Arc::new(table);

    let table_ref = |column: &str| TableNode {
        table: Arc::clone(&table),
        column: column.to_owned(),
        parameter_name: "Garment".to_owned(),
        add_none_option: false,
        default_row_name: String::new(),
        context: ctx(),
    };

    let mut surface = bare_surface("Body", &[]);
    surface.vectors.push(SurfaceChannel {
        name: "Tint".to_owned(),
        node: Some(Arc::new(morph_graph::ColorNode::Table(table_ref("Tint")))),
    });
    surface.scalars.push(SurfaceChannel {
        name: "Size".to_owned(),
        node: Some(Arc::new(ScalarNode::Table(table_ref("Size")))),
    });
    let root = object_of(vec![component_of(0, vec![Arc::new(SurfaceNode::New(surface))])]);
    let program = compile(Node::Object(root));

    let mut surfaces = Vec::new();
    collect_surfaces(&root_instance(&program), &mut surfaces);
    let InstanceOp::AddSurface { vectors, scalars, .. } = &*surfaces[0] else { unreachable!() };

    let ColorOp::Switch(color_switch) = &*vectors[0].op else {
        panic!("expected color table to lower to a switch");
    };
    let ScalarOp::Switch(scalar_switch) = &*scalars[0].op else {
        panic!("expected scalar table to lower to a switch");
    };
    // One branch per row, and one shared row-selector parameter.
    assert_eq!(color_switch.cases.len(), 2);
    assert_eq!(scalar_switch.cases.len(), 2);
    assert!(Arc::ptr_eq(&color_switch.selector, &scalar_switch.selector));

    let ScalarOp::Parameter(param) = &*color_switch.selector else {
        panic!("row selector should be a parameter");
    };
    assert_eq!(param.param.name, "Garment");
    let names: Vec<&str> = param.param.options.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, vec!["Short", "Long"]);
}

#[test]
fn mesh_table_keeps_empty_arm_branches() {
    let mut table = Table::new("props");
    table.add_column("Shape", ColumnType::Mesh).ok();
    table.add_row(1).ok();
    table.add_row(2).ok();
    table
        .set_cell(1, "Shape", CellValue::Mesh(Some(mesh_payload(3))))
        .ok();
    let node = Arc::new(MeshNode::Table(TableNode {
        table: Arc::new(table),
        column: "Shape".to_owned(),
        parameter_name: "Prop".to_owned(),
        add_none_option: false,
        default_row_name: String::new(),
        context: ctx(),
    }));
    let program = compile(Node::Mesh(node));

    match &program.states[0].root {
        Some(RootOp::Mesh(op)) => {
            let MeshOp::Switch(switch) = &**op else {
                panic!("expected the table to lower to a switch");
            };
            assert_eq!(switch.cases.len(), 2);
            assert!(switch.cases[0].branch.is_some());
            assert!(switch.cases[1].branch.is_none());
        }
        other => panic!("expected a mesh root, got {other:?}"),
    }
}

#[test]
fn empty_table_aborts_expansion_with_one_error() {
    let mut table = Table::new("empty");
    table.add_column("Shape", ColumnType::Mesh).ok();
    let node = Arc::new(MeshNode::Table(TableNode {
        table: Arc::new(table),
        column: "Shape".to_owned(),
        parameter_name: String::new(),
        add_none_option: false,
        default_row_name: String::new(),
        context: ctx(),
    }));
    let program = compile(Node::Mesh(node));
    assert_eq!(program.diagnostics.count(Severity::Error), 1);
    assert!(program.states[0].root.is_none());
}

#[test]
fn morph_target_adopts_base_layouts() {
    let base = Arc::new(MeshNode::Constant {
        mesh: mesh_payload(1),
        layouts: vec![layout_node()],
        context: ctx(),
    });
    let target = Arc::new(MeshNode::Constant {
        mesh: mesh_payload(2),
        layouts: vec![layout_node()],
        context: ctx(),
    });
    let morph = Arc::new(MeshNode::Morph {
        factor: Some(scalar_const(0.5)),
        base: Some(base),
        target: Some(target),
        context: ctx(),
    });
    let program = compile(Node::Mesh(morph));

    let Some(RootOp::Mesh(op)) = &program.states[0].root else {
        panic!("expected a mesh root");
    };
    let MeshOp::Morph { base, target, .. } = &**op else {
        panic!("expected a morph op");
    };
    let Some(base) = base else { panic!("missing base") };
    let Some(target) = target else { panic!("missing target") };
    let MeshOp::PrepareLayout { layout: base_layout, .. } = &**base else {
        panic!("base should carry a layout op");
    };
    let MeshOp::PrepareLayout { layout: target_layout, flags, .. } = &**target else {
        panic!("target should carry a layout op");
    };
    // The target reuses the base's generated layout instead of its own.
    assert!(Arc::ptr_eq(base_layout, target_layout));
    assert!(flags.contains(MeshLayoutFlags::ABSOLUTE_BLOCK_IDS));
}

#[test]
fn identical_constant_meshes_deduplicate() {
    let branch = |seed| {
        Some(Arc::new(MeshNode::Constant {
            mesh: mesh_payload(seed),
            layouts: vec![],
            context: ctx(),
        }))
    };
    let switch = Arc::new(MeshNode::Switch(SwitchNode {
        parameter: Some(Arc::new(ScalarNode::EnumParameter(
            morph_graph::EnumParameter {
                name: "Pick".to_owned(),
                uid: String::new(),
                default: 0,
                options: vec![],
                ranges: vec![],
                context: ctx(),
            },
        ))),
        options: vec![branch(9), branch(9)],
        context: ctx(),
    }));
    let program = compile(Node::Mesh(switch));

    let Some(RootOp::Mesh(op)) = &program.states[0].root else {
        panic!("expected a mesh root");
    };
    let MeshOp::Switch(switch) = &**op else { panic!("expected a switch") };
    let (Some(a), Some(b)) = (&switch.cases[0].branch, &switch.cases[1].branch) else {
        panic!("both branches should hold content");
    };
    // Same payload content in two distinct source nodes: one shared op.
    assert!(Arc::ptr_eq(a, b));
    let MeshOp::Constant { id_prefix, .. } = &**a else { panic!("expected a constant") };
    assert_ne!(*id_prefix, 0);
}

#[test]
fn matching_modifiers_splice_into_the_mesh_chain() {
    let modifier = Arc::new(ModifierNode {
        gating: ModifierGating {
            required_tags: vec!["Metal".to_owned()],
            excluded_tags: vec![],
            enable_tags: vec![],
            stage: ModifierStage::Post,
            component_filter: None,
        },
        kind: ModifierKind::ClipWithMesh {
            clip: Some(Arc::new(MeshNode::Constant {
                mesh: mesh_payload(7),
                layouts: vec![],
                context: ctx(),
            })),
        },
        context: ctx(),
    });

    let mut surface = bare_surface("Armor", &["Metal"]);
    surface.mesh = Some(Arc::new(MeshNode::Constant {
        mesh: mesh_payload(1),
        layouts: vec![],
        context: ctx(),
    }));

    let object = Arc::new(ObjectNode::New(ObjectNew {
        name: "Root".to_owned(),
        uid: String::new(),
        components: vec![component_of(0, vec![Arc::new(SurfaceNode::New(surface))])],
        modifiers: vec![modifier],
        children: vec![],
        states: vec![],
        extension_data: vec![],
        context: ctx(),
    }));
    let program = compile(Node::Object(object));

    let mut surfaces = Vec::new();
    collect_surfaces(&root_instance(&program), &mut surfaces);
    let InstanceOp::AddSurface { mesh, .. } = &*surfaces[0] else { unreachable!() };
    let Some(mesh) = mesh else { panic!("surface should carry a mesh") };

    // The modifier applies under its composed condition.
    let MeshOp::Conditional(conditional) = &**mesh else {
        panic!("expected the modifier to be guarded by a conditional");
    };
    let Some(yes) = &conditional.yes else { panic!("missing modified arm") };
    assert!(matches!(&**yes, MeshOp::ClipWithMesh { .. }));
}

#[test]
fn large_surface_images_are_tiled() {
    let mut options = CompilerOptions::new();
    options.image_tiling = 128;
    options.target_texture_size = 512;

    let mut surface = bare_surface("Body", &[]);
    surface.images.push(SurfaceChannel {
        name: "Albedo".to_owned(),
        node: Some(Arc::new(morph_graph::ImageNode::Constant {
            image: Arc::new(Image::blank([512, 512], ImageFormat::Rgba8)),
            context: ctx(),
        })),
    });
    let root = object_of(vec![component_of(0, vec![Arc::new(SurfaceNode::New(surface))])]);
    let program = Compiler::new(options)
        .compile(&Node::Object(root))
        .unwrap_or_else(|error| panic!("compile failed: {error}"));

    let mut surfaces = Vec::new();
    collect_surfaces(&root_instance(&program), &mut surfaces);
    let InstanceOp::AddSurface { images, .. } = &*surfaces[0] else { unreachable!() };
    assert!(matches!(&*images[0].op, ImageOp::Patch { .. }));
}

#[test]
fn shared_surfaces_reuse_layouts_across_lods() {
    let make_surface = || {
        let mut surface = bare_surface("Body", &[]);
        surface.shared_surface_id = Some(7);
        surface.mesh = Some(Arc::new(MeshNode::Constant {
            mesh: mesh_payload(1),
            layouts: vec![layout_node()],
            context: ctx(),
        }));
        Arc::new(SurfaceNode::New(surface))
    };
    let component = Arc::new(ComponentNode::New(ComponentNew {
        id: 0,
        lods: vec![
            Arc::new(LodNode { surfaces: vec![make_surface()] }),
            Arc::new(LodNode { surfaces: vec![make_surface()] }),
        ],
        context: ctx(),
    }));
    let root = object_of(vec![component]);
    let program = compile(Node::Object(root));

    let mut surfaces = Vec::new();
    collect_surfaces(&root_instance(&program), &mut surfaces);
    assert_eq!(surfaces.len(), 2);

    let mut layouts = Vec::new();
    let mut clamp_flags = Vec::new();
    for surface in &surfaces {
        let InstanceOp::AddSurface { mesh, .. } = &**surface else { unreachable!() };
        let Some(mesh) = mesh else { panic!("surface should carry a mesh") };
        let MeshOp::PrepareLayout { layout, flags, .. } = &**mesh else {
            panic!("expected a layout op");
        };
        layouts.push(Arc::clone(layout));
        clamp_flags.push(flags.contains(MeshLayoutFlags::CLAMP_UV_ISLANDS));
    }
    // Both LODs agree on one physical layout; the reusing LOD clamps
    // its UV islands.
    assert!(Arc::ptr_eq(&layouts[0], &layouts[1]));
    assert_eq!(clamp_flags.iter().filter(|&&clamped| clamped).count(), 1);
}
