//! SVG builder — accumulates SVG elements and produces the final string.

// ═══════════════════════════════════════════════════════════════════════
// SvgBuilder
// ═══════════════════════════════════════════════════════════════════════

pub(super) struct SvgBuilder {
    pub(super) elements: Vec<String>,
    width: f64,
    height: f64,
}

impl SvgBuilder {
    pub(super) fn new(width: f64, height: f64) -> Self {
        Self {
            elements: Vec::new(),
            width,
            height,
        }
    }

    pub(super) fn build(self) -> String {
        let mut svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" class="piano-roll" viewBox="0 0 {:.1} {:.1}" width="{:.1}" height="{:.1}" style="font-family: 'Helvetica Neue', Arial, sans-serif;">"#,
            self.width, self.height, self.width, self.height
        );
        svg.push('\n');
        for el in &self.elements {
            svg.push_str("  ");
            svg.push_str(el);
            svg.push('\n');
        }
        svg.push_str("</svg>\n");
        svg
    }

    pub(super) fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, color: &str, width: f64) {
        self.elements.push(format!(
            r#"<line x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="{}" stroke-width="{:.2}"/>"#,
            x1, y1, x2, y2, color, width
        ));
    }

    pub(super) fn rect(&mut self, x: f64, y: f64, w: f64, h: f64, fill: &str) {
        self.elements.push(format!(
            r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="{}"/>"#,
            x, y, w, h, fill
        ));
    }

    /// A filled rectangle with opacity and a hover tooltip.
    #[allow(clippy::too_many_arguments)]
    pub(super) fn titled_rect(
        &mut self,
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        fill: &str,
        opacity: f64,
        title: &str,
    ) {
        self.elements.push(format!(
            r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="{}" fill-opacity="{:.2}"><title>{}</title></rect>"#,
            x, y, w, h, fill, opacity, escape(title)
        ));
    }

    pub(super) fn text(
        &mut self,
        x: f64,
        y: f64,
        content: &str,
        size: f64,
        fill: &str,
        anchor: &str,
    ) {
        self.elements.push(format!(
            r#"<text x="{:.1}" y="{:.1}" font-size="{:.1}" fill="{}" text-anchor="{}" dominant-baseline="central">{}</text>"#,
            x, y, size, fill, anchor, escape(content)
        ));
    }

    pub(super) fn open_group(&mut self, class: &str, dx: f64, dy: f64) {
        if dx == 0.0 && dy == 0.0 {
            self.elements.push(format!(r#"<g class="{}">"#, class));
        } else {
            self.elements.push(format!(
                r#"<g class="{}" transform="translate({:.1},{:.1})">"#,
                class, dx, dy
            ));
        }
    }

    pub(super) fn close_group(&mut self) {
        self.elements.push("</g>".to_string());
    }

    pub(super) fn title(&mut self, content: &str) {
        self.elements.push(format!("<title>{}</title>", escape(content)));
    }
}

/// Escape text for use inside SVG/HTML element content or attributes.
pub(crate) fn escape(content: &str) -> String {
    content
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_wraps_elements_in_svg_root() {
        let mut svg = SvgBuilder::new(100.0, 50.0);
        svg.rect(0.0, 0.0, 100.0, 50.0, "#1e1e1e");
        svg.line(0.0, 10.5, 100.0, 10.5, "#444", 0.5);
        let out = svg.build();
        assert!(out.starts_with("<svg xmlns=\"http://www.w3.org/2000/svg\""));
        assert!(out.contains(r#"viewBox="0 0 100.0 50.0""#));
        let background = r##"<rect x="0.00" y="0.00" width="100.00" height="50.00" fill="#1e1e1e"/>"##;
        assert!(out.contains(background));
        assert!(out.contains(r#"stroke-width="0.50""#));
        assert!(out.ends_with("</svg>\n"));
    }

    #[test]
    fn text_content_is_escaped() {
        let mut svg = SvgBuilder::new(10.0, 10.0);
        svg.text(0.0, 0.0, "A<B & \"C\"", 8.0, "#fff", "start");
        assert!(svg.elements[0].contains("A&lt;B &amp; &quot;C&quot;"));
    }

    #[test]
    fn groups_translate_only_when_offset() {
        let mut svg = SvgBuilder::new(10.0, 10.0);
        svg.open_group("roll", 64.0, 0.0);
        svg.close_group();
        svg.open_group("keys", 0.0, 0.0);
        assert_eq!(svg.elements[0], r#"<g class="roll" transform="translate(64.0,0.0)">"#);
        assert_eq!(svg.elements[2], r#"<g class="keys">"#);
    }
}
