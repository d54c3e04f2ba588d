//! Built-in endpoint catalog.

use super::descriptor::{
    ArtifactKind, AttachmentSlot, CompletionMode, Dependency, EndpointDescriptor, Geometry,
    HttpMethod, ParameterSpec, RatioBound,
};
use crate::pricing::{CostFormula, Credits};

const PROMPT_MAX_CHARS: usize = 10_000;
const SEED_MAX: i64 = 2_147_483_647;
const ATTACHMENT_MAX_BYTES: u64 = 50 * 1024 * 1024;

const IMAGE_TYPES: &[&str] = &["image/png", "image/jpeg", "image/webp"];
const AUDIO_TYPES: &[&str] = &["audio/mpeg", "audio/mp3", "audio/wav"];
const IMAGE_FORMATS: &[&str] = &["png", "jpeg", "webp"];
const AUDIO_FORMATS: &[&str] = &["mp3", "wav"];
const STYLE_PRESETS: &[&str] = &[
    "photographic",
    "anime",
    "digital-art",
    "3d-model",
    "pixel-art",
    "cinematic",
    "fantasy-art",
    "illustration",
];
const ASPECT_RATIOS: &[&str] = &[
    "1:1", "16:9", "9:16", "3:2", "2:3", "4:3", "3:4", "21:9", "9:21", "4:5", "5:4",
];
const TEXTURE_RESOLUTIONS: &[&str] = &["512", "1024", "2048"];
const REMESH: &[&str] = &["none", "quad", "triangle"];

fn image_geometry() -> Geometry {
    Geometry {
        min_side: 64,
        max_pixels: 9_437_184,
        min_aspect: RatioBound::from_milli(1_000, 2_500),
        max_aspect: RatioBound::from_milli(2_500, 1_000),
    }
}

fn image_slot() -> AttachmentSlot {
    AttachmentSlot::new(IMAGE_TYPES)
        .max_bytes(ATTACHMENT_MAX_BYTES)
        .geometry(image_geometry())
}

fn audio_slot() -> AttachmentSlot {
    AttachmentSlot::new(AUDIO_TYPES).max_bytes(ATTACHMENT_MAX_BYTES)
}

fn prompt() -> ParameterSpec {
    ParameterSpec::prompt("prompt", PROMPT_MAX_CHARS).required()
}

fn negative_prompt() -> ParameterSpec {
    ParameterSpec::text("negative_prompt", PROMPT_MAX_CHARS)
}

fn seed() -> ParameterSpec {
    ParameterSpec::integer("seed", 0, SEED_MAX)
}

fn image_output_format() -> ParameterSpec {
    ParameterSpec::choice("output_format", IMAGE_FORMATS).default_value("png")
}

fn style_preset() -> ParameterSpec {
    ParameterSpec::choice("style_preset", STYLE_PRESETS)
}

fn aspect_ratio() -> ParameterSpec {
    ParameterSpec::choice("aspect_ratio", ASPECT_RATIOS).default_value("1:1")
}

fn unit(name: &str, default: f64) -> ParameterSpec {
    ParameterSpec::float(name, 0.0, 1.0).default_value(default)
}

fn descriptor(
    id: &str,
    title: &str,
    path: &str,
    mode: CompletionMode,
    artifact: ArtifactKind,
    params: Vec<ParameterSpec>,
    cost: CostFormula,
) -> EndpointDescriptor {
    EndpointDescriptor {
        id: id.to_string(),
        title: title.to_string(),
        method: HttpMethod::Post,
        path: path.to_string(),
        mode,
        artifact,
        params,
        cost,
    }
}

fn control(id: &str, title: &str, path: &str) -> EndpointDescriptor {
    descriptor(
        id,
        title,
        path,
        CompletionMode::Sync,
        ArtifactKind::Image,
        vec![
            prompt(),
            ParameterSpec::binary("image", image_slot()).required(),
            unit("control_strength", 0.7),
            negative_prompt(),
            image_output_format(),
            style_preset(),
            seed(),
        ],
        CostFormula::fixed(Credits::whole(3)),
    )
}

fn audio_params() -> Vec<ParameterSpec> {
    vec![
        prompt(),
        ParameterSpec::integer("duration", 1, 190).default_value(20i64),
        seed(),
        ParameterSpec::integer("steps", 30, 100).default_value(50i64),
        ParameterSpec::float("cfg_scale", 1.0, 25.0).default_value(7.0),
        ParameterSpec::choice("output_format", AUDIO_FORMATS).default_value("mp3"),
    ]
}

fn audio_cost() -> CostFormula {
    CostFormula::linear(Credits::whole(9), Credits::from_milli(60), "steps")
}

fn mesh_params() -> Vec<ParameterSpec> {
    vec![
        ParameterSpec::binary("image", image_slot()).required(),
        ParameterSpec::choice("texture_resolution", TEXTURE_RESOLUTIONS).default_value("1024"),
        ParameterSpec::float("foreground_ratio", 0.1, 2.0).default_value(0.85),
        ParameterSpec::choice("remesh", REMESH).default_value("none"),
    ]
}

pub(crate) fn builtin_descriptors() -> Vec<EndpointDescriptor> {
    let mut audio_to_audio = audio_params();
    audio_to_audio.insert(1, ParameterSpec::binary("audio", audio_slot()).required());
    audio_to_audio.push(unit("strength", 1.0));

    let mut fast_3d = mesh_params();
    fast_3d.push(ParameterSpec::integer("vertex_count", -1, 20_000).default_value(-1i64));

    let mut point_aware_3d = mesh_params();
    point_aware_3d.extend([
        ParameterSpec::float("guidance_scale", 1.0, 10.0).default_value(3.0),
        ParameterSpec::choice("target_type", &["none", "vertex", "face"]).default_value("none"),
        ParameterSpec::integer("target_count", 100, 20_000)
            .default_value(1000i64)
            .depends(Dependency::forbidden_unless("target_type", &["vertex", "face"])),
    ]);

    vec![
        descriptor(
            "stable-image-core",
            "Stable Image Core",
            "/v2beta/stable-image/generate/core",
            CompletionMode::Sync,
            ArtifactKind::Image,
            vec![
                prompt(),
                negative_prompt(),
                aspect_ratio(),
                image_output_format(),
                style_preset(),
                seed(),
            ],
            CostFormula::fixed(Credits::whole(3)),
        ),
        descriptor(
            "sd3.5",
            "Stable Diffusion 3.5",
            "/v2beta/stable-image/generate/sd3",
            CompletionMode::Sync,
            ArtifactKind::Image,
            vec![
                prompt(),
                ParameterSpec::choice("mode", &["text-to-image", "image-to-image"])
                    .default_value("text-to-image"),
                ParameterSpec::choice("model", &["sd3.5-large", "sd3.5-large-turbo", "sd3.5-medium"])
                    .default_value("sd3.5-large"),
                ParameterSpec::binary("image", image_slot())
                    .depends(Dependency::required_when("mode", &["image-to-image"]))
                    .depends(Dependency::forbidden_unless("mode", &["image-to-image"])),
                ParameterSpec::float("strength", 0.0, 1.0)
                    .depends(Dependency::required_when("mode", &["image-to-image"]))
                    .depends(Dependency::requires("image")),
                aspect_ratio().depends(Dependency::forbidden_unless("mode", &["text-to-image"])),
                negative_prompt(),
                image_output_format(),
                style_preset(),
                seed(),
            ],
            CostFormula::by_choice(
                "model",
                &[
                    ("sd3.5-large", Credits::from_milli(6_500)),
                    ("sd3.5-large-turbo", Credits::whole(4)),
                    ("sd3.5-medium", Credits::from_milli(3_500)),
                ],
            ),
        ),
        descriptor(
            "stable-image-ultra",
            "Stable Image Ultra",
            "/v2beta/stable-image/generate/ultra",
            CompletionMode::Sync,
            ArtifactKind::Image,
            vec![
                prompt(),
                ParameterSpec::binary("image", image_slot()),
                ParameterSpec::float("strength", 0.0, 1.0).depends(Dependency::requires("image")),
                aspect_ratio(),
                negative_prompt(),
                image_output_format(),
                style_preset(),
                seed(),
            ],
            CostFormula::fixed(Credits::whole(8)),
        ),
        control("sketch", "Sketch", "/v2beta/stable-image/control/sketch"),
        control("structure", "Structure", "/v2beta/stable-image/control/structure"),
        descriptor(
            "style-guide",
            "Style Guide",
            "/v2beta/stable-image/control/style",
            CompletionMode::Sync,
            ArtifactKind::Image,
            vec![
                prompt(),
                ParameterSpec::binary("image", image_slot()).required(),
                unit("fidelity", 0.5),
                aspect_ratio(),
                negative_prompt(),
                image_output_format(),
                style_preset(),
                seed(),
            ],
            CostFormula::fixed(Credits::whole(4)),
        ),
        descriptor(
            "style-transfer",
            "Style Transfer",
            "/v2beta/stable-image/control/style-transfer",
            CompletionMode::Sync,
            ArtifactKind::Image,
            vec![
                ParameterSpec::binary("init_image", image_slot()).required(),
                ParameterSpec::binary("style_image", image_slot()).required(),
                ParameterSpec::prompt("prompt", PROMPT_MAX_CHARS),
                unit("style_strength", 1.0),
                unit("composition_fidelity", 0.9),
                ParameterSpec::float("change_strength", 0.1, 1.0).default_value(0.9),
                negative_prompt(),
                image_output_format(),
                seed(),
            ],
            CostFormula::fixed(Credits::whole(8)),
        ),
        descriptor(
            "text-to-audio",
            "Stable Audio 2 (text to audio)",
            "/v2beta/audio/stable-audio-2/text-to-audio",
            CompletionMode::Async,
            ArtifactKind::Audio,
            audio_params(),
            audio_cost(),
        ),
        descriptor(
            "audio-to-audio",
            "Stable Audio 2 (audio to audio)",
            "/v2beta/audio/stable-audio-2/audio-to-audio",
            CompletionMode::Async,
            ArtifactKind::Audio,
            audio_to_audio,
            audio_cost(),
        ),
        descriptor(
            "stable-fast-3d",
            "Stable Fast 3D",
            "/v2beta/3d/stable-fast-3d",
            CompletionMode::Sync,
            ArtifactKind::Model,
            fast_3d,
            CostFormula::fixed(Credits::whole(2)),
        ),
        descriptor(
            "stable-point-aware-3d",
            "Stable Point Aware 3D",
            "/v2beta/3d/stable-point-aware-3d",
            CompletionMode::Sync,
            ArtifactKind::Model,
            point_aware_3d,
            CostFormula::fixed(Credits::whole(4)),
        ),
    ]
}
