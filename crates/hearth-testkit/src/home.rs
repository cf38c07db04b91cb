//! A minimal home document.

use hearth_core::{Content, Document};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Wall {
    pub x_start: f32,
    pub y_start: f32,
    pub x_end: f32,
    pub y_end: f32,
    pub thickness: f32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Piece {
    pub name: String,
    pub icon: Content,
    pub model: Content,
    pub x: f32,
    pub y: f32,
}

/// Levels and cameras are left out; walls stand for the plain structure.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SampleHome {
    pub name: Option<String>,
    pub walls: Vec<Wall>,
    pub furniture: Vec<Piece>,
    pub background: Option<Content>,
    #[serde(skip)]
    pub modified: bool,
    #[serde(skip)]
    pub revision: u64,
}

impl SampleHome {
    pub fn new() -> Self {
        Self {
            name: None,
            walls: Vec::new(),
            furniture: Vec::new(),
            background: None,
            modified: false,
            revision: 0,
        }
    }

    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::new()
        }
    }

    pub fn add_wall(&mut self, x_start: f32, y_start: f32, x_end: f32, y_end: f32) {
        self.walls.push(Wall {
            x_start,
            y_start,
            x_end,
            y_end,
            thickness: 7.5,
        });
        self.touch();
    }

    pub fn add_piece(&mut self, name: &str, icon: Content, model: Content) {
        let offset = self.furniture.len() as f32 * 50.0;
        self.furniture.push(Piece {
            name: name.to_string(),
            icon,
            model,
            x: offset,
            y: offset,
        });
        self.touch();
    }

    pub fn set_background(&mut self, image: Content) {
        self.background = Some(image);
        self.touch();
    }

    /// Record an edit.
    pub fn touch(&mut self) {
        self.modified = true;
        self.revision += 1;
    }

    /// Record a save.
    pub fn mark_saved(&mut self) {
        self.modified = false;
    }

    /// Digest-independent structure, for comparing round trips.
    pub fn structure(&self) -> (Option<&str>, &[Wall], Vec<(&str, f32, f32)>) {
        (
            self.name.as_deref(),
            &self.walls,
            self.furniture.iter().map(|p| (p.name.as_str(), p.x, p.y)).collect(),
        )
    }
}

impl Default for SampleHome {
    fn default() -> Self {
        Self::new()
    }
}

impl Document for SampleHome {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn is_modified(&self) -> bool {
        self.modified
    }

    fn revision(&self) -> Option<u64> {
        Some(self.revision)
    }

    fn visit_contents(&self, visit: &mut dyn FnMut(&Content)) {
        for piece in &self.furniture {
            visit(&piece.icon);
            visit(&piece.model);
        }
        if let Some(background) = &self.background {
            visit(background);
        }
    }

    fn replace_contents(&mut self, replace: &mut dyn FnMut(&Content) -> Content) {
        for piece in &mut self.furniture {
            piece.icon = replace(&piece.icon);
            piece.model = replace(&piece.model);
        }
        if let Some(background) = &mut self.background {
            *background = replace(background);
        }
    }
}
