// src/theme.rs
//
// The selector is one panel of full-width buttons, so only the panel fill,
// button states and spacing are styled.
use egui::{Color32, Context, CornerRadius, Stroke};

pub const ACCENT:        Color32 = Color32::from_rgb( 80, 170, 255);
/// Actions whose tool is missing; pressing them starts the install flow.
pub const NOT_INSTALLED: Color32 = Color32::from_rgb(200, 150,  60);
pub const ERROR:         Color32 = Color32::from_rgb(220,  90,  70);

const PANEL:  Color32 = Color32::from_rgb(20, 20, 24);
const BUTTON: Color32 = Color32::from_rgb(38, 38, 46);
const TEXT:   Color32 = Color32::from_rgb(220, 220, 230);

pub fn configure_style(ctx: &Context) {
    ctx.style_mut(|s| {
        s.spacing.item_spacing   = egui::vec2(6.0, 6.0);
        s.spacing.button_padding = egui::vec2(12.0, 7.0);

        let v = &mut s.visuals;
        v.panel_fill          = PANEL;
        v.override_text_color = Some(TEXT);
        for w in [&mut v.widgets.inactive, &mut v.widgets.hovered, &mut v.widgets.active] {
            w.corner_radius = CornerRadius::same(4);
        }
        v.widgets.inactive.weak_bg_fill = BUTTON;
        v.widgets.hovered.bg_stroke     = Stroke::new(1.0, ACCENT);
        v.widgets.active.weak_bg_fill   = ACCENT.gamma_multiply(0.5);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buttons_and_panel_are_restyled() {
        let ctx = Context::default();
        configure_style(&ctx);
        let style = ctx.style();
        assert_eq!(style.visuals.panel_fill, PANEL);
        assert_eq!(style.visuals.widgets.inactive.weak_bg_fill, BUTTON);
        assert_eq!(style.visuals.override_text_color, Some(TEXT));
    }
}
