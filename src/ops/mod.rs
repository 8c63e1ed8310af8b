pub mod adjustments;
pub mod canvas_ops;
pub mod inpaint;
pub mod patch_match;
