use kiln_assets::{Material, Model, Shader, ShaderStage, Texture, register_builtin_managers};
use kiln_crate_tools::resource::KilnPath;
use kiln_resource::file_system::{MemoryFileSystem, ThreadedFileSystem};
use kiln_resource::{Asset, DependencyManager, FileSystem, ResourceError, ResourceState};
use std::io::Cursor;
use std::rc::Rc;
use std::time::{Duration, Instant};

fn encode_image(format: image::ImageFormat) -> Vec<u8> {
    let image = image::RgbaImage::from_fn(2, 2, |x, y| image::Rgba([x as u8 * 255, y as u8 * 255, 0, 255]));
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
    bytes
}

fn wait_until_finished(deps: &mut DependencyManager) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !deps.is_idle() && Instant::now() < deadline {
        deps.update();
        std::thread::sleep(Duration::from_millis(1));
    }
}

fn setup(fs: &MemoryFileSystem) -> DependencyManager {
    let mut deps = DependencyManager::new();
    register_builtin_managers(&mut deps, Rc::new(fs.clone())).unwrap();
    deps
}

#[test]
fn test_material_waits_for_shader_and_texture() {
    let fs = MemoryFileSystem::new();
    fs.insert("mats/mat.mtl", r#"{ "shader": "shader.vs", "textures": ["tex.tga"], "params": { "roughness": 0.5 } }"#);
    fs.insert("mats/shader.vs", "void main() {}");
    fs.insert("mats/tex.tga", encode_image(image::ImageFormat::Tga));
    let mut deps = setup(&fs);

    let mat = deps.load::<Material>("mats/mat.mtl");
    fs.complete_path("mats/mat.mtl");
    deps.update();
    assert_eq!(deps.state(mat), ResourceState::Loading);
    assert_eq!(deps.pending_waits().len(), 2);

    // 两个子资源各自完成，材质在第二个完成后才 Ready
    fs.complete_path("mats/tex.tga");
    deps.update();
    assert_eq!(deps.state(mat), ResourceState::Loading);
    assert_eq!(deps.resource(mat).and_then(|r| r.asset()).unwrap().resolved.len(), 1);

    fs.complete_path("mats/shader.vs");
    deps.update();
    assert_eq!(deps.state(mat), ResourceState::Ready);
    assert_eq!(deps.notifications_sent(), 2);

    let material = deps.get(mat).unwrap();
    assert_eq!(material.resolved.len(), 2);
    assert!(material.resolved.iter().all(|(_, state)| *state == ResourceState::Ready));
    assert_eq!(material.param("roughness"), Some(0.5));

    let shader = deps.get(material.shader).unwrap();
    assert_eq!(shader.stage, ShaderStage::Vertex);
    assert_eq!(shader.source, "void main() {}");

    let texture = deps.get(material.textures[0]).unwrap();
    assert_eq!((texture.width(), texture.height()), (2, 2));
    assert_eq!(texture.pixel(1, 1), Some([255, 255, 0, 255]));
}

#[test]
fn test_finished_material_notifies_waiting_model_once() {
    let fs = MemoryFileSystem::new();
    fs.insert("m.model", r#"{ "materials": ["mat.mtl"] }"#);
    fs.insert("mat.mtl", r#"{ "shader": "shader.vs", "textures": ["tex.tga"] }"#);
    fs.insert("shader.vs", "void main() {}");
    fs.insert("tex.tga", encode_image(image::ImageFormat::Tga));
    let mut deps = setup(&fs);

    let model = deps.load::<Model>("m.model");
    fs.complete_path("m.model");
    deps.update();
    fs.complete_path("mat.mtl");
    deps.update();
    assert_eq!(deps.pending_waits().len(), 3);

    fs.complete_path("tex.tga");
    deps.update();
    assert_eq!(deps.notifications_sent(), 1);
    assert_eq!(deps.pending_waits().len(), 2);

    // shader 完成后材质 Ready，模型只收到一次材质的通知
    fs.complete_path("shader.vs");
    deps.update();
    assert_eq!(deps.notifications_sent(), 3);
    assert!(deps.pending_waits().is_empty());
    assert_eq!(deps.state(model), ResourceState::Ready);

    deps.update();
    deps.update();
    assert_eq!(deps.notifications_sent(), 3);
    assert_eq!(deps.state(model), ResourceState::Ready);
}

#[test]
fn test_model_graph_shares_children() {
    let fs = MemoryFileSystem::new();
    fs.insert(
        "scene/box.model",
        r#"{
            "materials": ["mats/red.mtl", "mats/blue.mtl"],
            "meshes": [
                { "name": "a", "material": 0, "positions": [[0, 0, 0], [1, 0, 0], [0, 1, 0]], "indices": [0, 1, 2] },
                { "name": "b", "material": 1, "positions": [[0, 0, 1], [1, 0, 1], [0, 1, 1]], "indices": [0, 1, 2] }
            ]
        }"#,
    );
    fs.insert("scene/mats/red.mtl", r#"{ "shader": "../shaders/lit.fs", "textures": ["checker.png"] }"#);
    fs.insert("scene/mats/blue.mtl", r#"{ "shader": "../shaders/lit.fs" }"#);
    fs.insert("scene/shaders/lit.fs", "out vec4 color;");
    fs.insert("scene/mats/checker.png", encode_image(image::ImageFormat::Png));
    let mut deps = setup(&fs);

    let model = deps.load::<Model>("scene/box.model");
    for _ in 0..8 {
        fs.complete_all();
        deps.update();
    }

    assert_eq!(deps.state(model), ResourceState::Ready);
    assert!(deps.is_idle());
    assert_eq!(fs.read_count("scene/shaders/lit.fs"), 1);

    let loaded = deps.get(model).unwrap();
    assert_eq!(loaded.materials.len(), 2);
    assert_eq!(loaded.triangle_count(), 2);
    let red = deps.get(loaded.materials[0]).unwrap();
    let blue = deps.get(loaded.materials[1]).unwrap();
    assert_eq!(red.shader, blue.shader);

    let shader = deps.resource(red.shader).unwrap();
    assert_eq!(shader.ref_count(), 2);

    deps.unload(model);
    for (ty, stats) in deps.stats() {
        assert_eq!(stats.resources, 0, "{} still holds resources", ty);
    }
}

#[test]
fn test_broken_texture_fails_material_and_model() {
    let fs = MemoryFileSystem::new();
    fs.insert("m.model", r#"{ "materials": ["m.mtl"] }"#);
    fs.insert("m.mtl", r#"{ "shader": "s.vs", "textures": ["broken.png"] }"#);
    fs.insert("s.vs", "void main() {}");
    fs.insert("broken.png", "definitely not a png");
    let mut deps = setup(&fs);

    let model = deps.load::<Model>("m.model");
    for _ in 0..6 {
        fs.complete_all();
        deps.update();
    }

    assert_eq!(deps.state(model), ResourceState::Failure);
    let texture = deps.manager::<Texture>().unwrap().find("broken.png").unwrap();
    assert!(matches!(
        deps.resource(texture).and_then(|r| r.failure()),
        Some(ResourceError::Parse { .. })
    ));
    let material = deps.manager::<Material>().unwrap().find("m.mtl").unwrap();
    assert_eq!(deps.state(material), ResourceState::Failure);

    match deps.resource(model).and_then(|r| r.failure()) {
        Some(ResourceError::DependencyFailed { dependency_type, .. }) => assert_eq!(*dependency_type, Material::TYPE),
        other => panic!("unexpected failure: {other:?}"),
    }
}

#[test]
fn test_invalid_documents_fail_to_parse() {
    let fs = MemoryFileSystem::new();
    fs.insert("empty.vs", "   \n");
    fs.insert("noshader.mtl", r#"{ "textures": [] }"#);
    fs.insert("bad.model", r#"{ "materials": [], "meshes": [{ "name": "x", "material": 2, "positions": [], "indices": [] }] }"#);
    let mut deps = setup(&fs);

    let shader = deps.load::<Shader>("empty.vs");
    let material = deps.load::<Material>("noshader.mtl");
    let model = deps.load::<Model>("bad.model");
    fs.complete_all();
    deps.update();

    for state in [deps.state(shader), deps.state(material), deps.state(model)] {
        assert_eq!(state, ResourceState::Failure);
    }
    assert!(deps.pending_waits().is_empty());
}

#[test]
fn test_threaded_file_system_loads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("mat.mtl"), r#"{ "shader": "shader.vs", "textures": ["tex.tga"] }"#).unwrap();
    std::fs::write(dir.path().join("shader.vs"), "void main() {}").unwrap();
    std::fs::write(dir.path().join("tex.tga"), encode_image(image::ImageFormat::Tga)).unwrap();

    let fs: Rc<dyn FileSystem> = Rc::new(ThreadedFileSystem::new(dir.path(), 2).unwrap());
    let mut deps = DependencyManager::new();
    register_builtin_managers(&mut deps, fs).unwrap();

    let mat = deps.load::<Material>("mat.mtl");
    wait_until_finished(&mut deps);

    assert_eq!(deps.state(mat), ResourceState::Ready);
    let material = deps.get(mat).unwrap();
    assert_eq!(deps.state(material.shader), ResourceState::Ready);
    assert_eq!(deps.state(material.textures[0]), ResourceState::Ready);
}

#[test]
fn test_demo_assets_load() {
    let fs: Rc<dyn FileSystem> = Rc::new(ThreadedFileSystem::new(KilnPath::assets_root(), 2).unwrap());
    let mut deps = DependencyManager::new();
    register_builtin_managers(&mut deps, fs).unwrap();

    let model = deps.load::<Model>("demo/crate.model");
    wait_until_finished(&mut deps);

    assert_eq!(deps.state(model), ResourceState::Ready);
    let model = deps.get(model).unwrap();
    assert_eq!(model.materials.len(), 2);
    assert_eq!(model.triangle_count(), 3);

    // 两个材质引用同一张贴图
    let textures = deps.manager::<Texture>().unwrap().stats();
    assert_eq!((textures.resources, textures.reads_issued), (1, 1));
    let crate_material = deps.get(model.materials[0]).unwrap();
    assert_eq!(deps.get(crate_material.textures[0]).unwrap().width(), 2);
}
