use serde::{Deserialize, Serialize};

use crate::canvas::{PatchWindow, PixelBuffer, Region};
use crate::ops::inpaint::{BlendFalloff, HealOutcome, heal_at};

/// When the heal brush fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CursorType {
    /// One heal per press.
    #[default]
    Basic,
    /// One heal per press, then one per move while the button is held.
    Continuous,
}

impl CursorType {
    pub fn label(&self) -> &'static str {
        match self {
            CursorType::Basic => "Basic",
            CursorType::Continuous => "Continuous",
        }
    }
    pub fn all() -> &'static [CursorType] {
        &[CursorType::Basic, CursorType::Continuous]
    }
    pub fn from_name(name: &str) -> Option<CursorType> {
        match name.to_lowercase().as_str() {
            "basic" => Some(CursorType::Basic),
            "continuous" => Some(CursorType::Continuous),
            _ => None,
        }
    }
}

/// Heal brush settings, as set by the tool panel or a preset file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrushState {
    /// Brush diameter in pixels. The heal radius is half of this, rounded
    /// down, so odd sizes heal like the next even size below them.
    pub cursor_size: i32,
    /// Multiplier on the falloff weight. Not clamped; above 1 overshoots.
    pub blending_intensity: f32,
    /// How far (per axis) the source search reaches from the target.
    pub search_radius: i32,
    /// Fraction of the radius that is actually blended (0..1).
    pub affected_area: f32,
    /// Stored with presets but not used by the blend.
    pub feathering: f32,
    pub cursor_type: CursorType,
    pub falloff: BlendFalloff,
    /// Minimum pointer travel between continuous heals. 0 heals on every move.
    pub min_spacing: f32,
}

impl Default for BrushState {
    fn default() -> Self {
        Self {
            cursor_size: 20,
            blending_intensity: 1.0,
            search_radius: 10,
            affected_area: 1.0,
            feathering: 0.0,
            cursor_type: CursorType::Basic,
            falloff: BlendFalloff::Gaussian,
            min_spacing: 0.0,
        }
    }
}

impl BrushState {
    /// Heal radius (`cursor_size / 2`, truncated).
    pub fn radius(&self) -> i32 {
        self.cursor_size / 2
    }
}

// ============================================================================
// HEAL TOOL — pointer state machine
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PointerState {
    #[default]
    Idle,
    Active,
}

/// Drives [`heal_at`] from pointer events.
///
/// `Idle --down--> Active` heals once. In continuous mode every move while
/// `Active` heals again; in basic mode moves only track the cursor.
/// `Active --up--> Idle` hands back the finished [`StrokeEvent`].
#[derive(Default)]
pub struct HealTool {
    brush: BrushState,
    state: PointerState,
    /// Pointer position of the last heal in this stroke.
    last_heal: Option<(i32, i32)>,
    /// Last pointer position seen, for cursor display.
    cursor: Option<(i32, i32)>,
    stroke: StrokeTracker,
}

impl HealTool {
    pub fn new(brush: BrushState) -> Self {
        Self { brush, ..Self::default() }
    }

    pub fn brush(&self) -> &BrushState {
        &self.brush
    }

    /// Replace the brush. Takes effect from the next heal.
    pub fn set_brush(&mut self, brush: BrushState) {
        self.brush = brush;
    }

    pub fn state(&self) -> PointerState {
        self.state
    }

    pub fn cursor(&self) -> Option<(i32, i32)> {
        self.cursor
    }

    /// Press: start a stroke and heal under the pointer.
    ///
    /// A press while already active (a missed release) closes the old
    /// stroke and folds it into the new one, so the next release still
    /// hands back every changed pixel for undo.
    pub fn on_pointer_down<B: PixelBuffer + ?Sized>(
        &mut self,
        buffer: &mut B,
        x: i32,
        y: i32,
    ) -> Option<HealOutcome> {
        let unreleased = if self.state == PointerState::Active {
            self.stroke.finish()
        } else {
            None
        };
        self.state = PointerState::Active;
        self.cursor = Some((x, y));
        self.last_heal = None;
        self.stroke.start();
        if let Some(ev) = unreleased {
            crate::log_warn!(
                "Heal stroke without release: {} heals, {} applied, bounds {:?}",
                ev.heals,
                ev.applied,
                ev.bounds
            );
            self.stroke.absorb(ev);
        }
        Some(self.heal(buffer, x, y))
    }

    /// Move: heals only while active in continuous mode, and only once the
    /// pointer has travelled `min_spacing` since the last heal.
    pub fn on_pointer_move<B: PixelBuffer + ?Sized>(
        &mut self,
        buffer: &mut B,
        x: i32,
        y: i32,
    ) -> Option<HealOutcome> {
        self.cursor = Some((x, y));
        if self.state != PointerState::Active || self.brush.cursor_type != CursorType::Continuous {
            return None;
        }
        if self.brush.min_spacing > 0.0
            && let Some((lx, ly)) = self.last_heal
        {
            let (dx, dy) = ((x - lx) as f32, (y - ly) as f32);
            if (dx * dx + dy * dy).sqrt() < self.brush.min_spacing {
                return None;
            }
        }
        Some(self.heal(buffer, x, y))
    }

    /// Release: back to idle. `None` if no stroke was in progress.
    pub fn on_pointer_up(&mut self) -> Option<StrokeEvent> {
        if self.state != PointerState::Active {
            return None;
        }
        self.state = PointerState::Idle;
        self.last_heal = None;
        let event = self.stroke.finish();
        if let Some(ev) = &event {
            crate::log_info!(
                "Heal stroke ({}): {} heals, {} applied, bounds {:?}",
                self.brush.cursor_type.label(),
                ev.heals,
                ev.applied,
                ev.bounds
            );
        }
        event
    }

    fn heal<B: PixelBuffer + ?Sized>(&mut self, buffer: &mut B, x: i32, y: i32) -> HealOutcome {
        self.last_heal = Some((x, y));
        let outcome = heal_at(buffer, x, y, &self.brush);
        self.stroke.record(&outcome);
        outcome
    }
}

// ============================================================================
// STROKE TRACKING — undo record for one press..release
// ============================================================================

/// Accumulates what one stroke did so the host can undo it.
#[derive(Default)]
pub struct StrokeTracker {
    pub is_active: bool,
    /// `heal_at` calls made this stroke, healed or skipped.
    pub heals: usize,
    pub applied: usize,
    pub bounds: Option<Region>,
    /// Pre-blend target windows, in heal order.
    before: Vec<PatchWindow>,
}

impl StrokeTracker {
    pub fn start(&mut self) {
        self.cancel();
        self.is_active = true;
    }

    pub fn record(&mut self, outcome: &HealOutcome) {
        if !self.is_active {
            return;
        }
        self.heals += 1;
        if let Some(report) = outcome.report() {
            self.applied += 1;
            self.bounds = Some(match self.bounds {
                Some(b) => b.union(report.target),
                None => report.target,
            });
            self.before.push(report.before.clone());
        }
    }

    /// Carry a finished stroke into the active one: its counts, bounds and
    /// undo windows. Its windows stay ahead of anything recorded later.
    pub fn absorb(&mut self, event: StrokeEvent) {
        if !self.is_active {
            return;
        }
        self.heals += event.heals;
        self.applied += event.applied;
        self.bounds = match (self.bounds, event.bounds) {
            (Some(a), Some(b)) => Some(a.union(b)),
            (a, b) => a.or(b),
        };
        let mut before = event.before;
        before.append(&mut self.before);
        self.before = before;
    }

    pub fn finish(&mut self) -> Option<StrokeEvent> {
        if !self.is_active {
            return None;
        }
        let event = StrokeEvent {
            heals: self.heals,
            applied: self.applied,
            bounds: self.bounds,
            before: std::mem::take(&mut self.before),
        };
        self.cancel();
        Some(event)
    }

    pub fn cancel(&mut self) {
        self.is_active = false;
        self.heals = 0;
        self.applied = 0;
        self.bounds = None;
        self.before.clear();
    }
}

/// Emitted when a stroke completes.
#[derive(Clone, Debug)]
pub struct StrokeEvent {
    pub heals: usize,
    pub applied: usize,
    /// Union of every healed window; `None` if nothing was applied.
    pub bounds: Option<Region>,
    before: Vec<PatchWindow>,
}

impl StrokeEvent {
    /// Put back every pixel the stroke changed.
    ///
    /// Windows are restored newest first so overlapping heals unwind in
    /// order. Only valid on the buffer the stroke ran on, before any later
    /// edit touched the same pixels.
    pub fn revert<B: PixelBuffer + ?Sized>(&self, buffer: &mut B) {
        for window in self.before.iter().rev() {
            buffer.write(window.origin.0, window.origin.1, window);
        }
    }
}
