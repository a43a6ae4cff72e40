use serde::{Deserialize, Serialize};

/// Id of the demo every unknown id falls back to.
pub const DEFAULT_DEMO_ID: &str = "rotating-triangle";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DemoDescriptor {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl DemoDescriptor {
    pub fn new(id: &str, title: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
        }
    }
}

/// The gallery's default table, in display order.
pub fn builtin_demos() -> Vec<DemoDescriptor> {
    vec![
        DemoDescriptor::new(
            DEFAULT_DEMO_ID,
            "Rotating Triangle",
            "Minimal rendering: per-vertex colours and rotation.",
        ),
        DemoDescriptor::new(
            "clear-colors",
            "Clear Colours",
            "Nothing but a clear colour that drifts every frame.",
        ),
        DemoDescriptor::new(
            "compute-particles-free-fall",
            "Free-Fall Particles",
            "Compute shader integrating 4096 bouncing particles, drawn instanced.",
        ),
        DemoDescriptor::new(
            "demo",
            "Petals",
            "Full-screen fragment shader: rotating polar petals.",
        ),
        DemoDescriptor::new(
            "input-mouse",
            "Mouse Ring",
            "A pulsing ring that follows the pointer.",
        ),
        DemoDescriptor::new(
            "texture",
            "Texture Hue Shift",
            "Drop an image on the window; the pointer shifts its hue.",
        ),
    ]
}
