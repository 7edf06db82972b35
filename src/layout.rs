use crate::report::{ClassReport, RosterRow};
use pdf_writer::{Content, Finish, Name, Pdf, Rect, Ref, Str};

// A4 in PostScript points; layout positions below are in millimetres from
// the top-left corner, matching the printed form this report replaces.
const PAGE_W_MM: f32 = 210.0;
const PAGE_H_MM: f32 = 297.0;
const MM_TO_PT: f32 = 72.0 / 25.4;

const HEADER_BLUE: (f32, f32, f32) = (0.16, 0.50, 0.73);
const POINT_RED: (f32, f32, f32) = (0.91, 0.30, 0.24);
const AVG_GREEN: (f32, f32, f32) = (0.18, 0.80, 0.44);
const GRID_INTERVAL: f64 = 10.0;

const TABLE_TOP_MM: f32 = 42.0;
const TABLE_HEADER_H_MM: f32 = 5.0;
const TABLE_ROW_H_MM: f32 = 4.0;
const TABLE_W_MM: f32 = 83.0;
const COL_W_MM: [f32; 5] = [6.0, 15.0, 32.0, 15.0, 15.0];

/// Split a roster into two near-equal halves, left half taking the extra
/// row. Concatenating the halves reproduces the original order.
pub fn split_roster<T>(roster: &[T]) -> (&[T], &[T]) {
    let midpoint = roster.len().div_ceil(2);
    roster.split_at(midpoint)
}

fn fmt_num(v: f64) -> String {
    format!("{}", v)
}

struct Painter {
    content: Content,
}

impl Painter {
    fn new() -> Self {
        Painter {
            content: Content::new(),
        }
    }

    fn x(&self, mm: f32) -> f32 {
        mm * MM_TO_PT
    }

    fn y(&self, mm: f32) -> f32 {
        (PAGE_H_MM - mm) * MM_TO_PT
    }

    fn text(&mut self, s: &str, size: f32, x_mm: f32, y_mm: f32, bold: bool) {
        let font = if bold { Name(b"F2") } else { Name(b"F1") };
        let (x, y) = (self.x(x_mm), self.y(y_mm));
        self.content.begin_text();
        self.content.set_font(font, size);
        self.content.next_line(x, y);
        self.content.show(Str(s.as_bytes()));
        self.content.end_text();
    }

    // Helvetica metrics are not embedded; half an em per glyph is close
    // enough for centering short report labels.
    fn text_centered(&mut self, s: &str, size: f32, cx_mm: f32, y_mm: f32, bold: bool) {
        let w_mm = s.len() as f32 * size * 0.5 / MM_TO_PT;
        self.text(s, size, cx_mm - w_mm / 2.0, y_mm, bold);
    }

    fn text_right(&mut self, s: &str, size: f32, rx_mm: f32, y_mm: f32) {
        let w_mm = s.len() as f32 * size * 0.5 / MM_TO_PT;
        self.text(s, size, rx_mm - w_mm, y_mm, false);
    }

    fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) {
        let (ax, ay) = (self.x(x1), self.y(y1));
        let (bx, by) = (self.x(x2), self.y(y2));
        self.content.move_to(ax, ay);
        self.content.line_to(bx, by);
        self.content.stroke();
    }

    fn rect_stroke(&mut self, x_mm: f32, y_mm: f32, w_mm: f32, h_mm: f32) {
        let (x, y) = (self.x(x_mm), self.y(y_mm + h_mm));
        self.content
            .rect(x, y, w_mm * MM_TO_PT, h_mm * MM_TO_PT);
        self.content.stroke();
    }

    fn rect_fill(&mut self, x_mm: f32, y_mm: f32, w_mm: f32, h_mm: f32) {
        let (x, y) = (self.x(x_mm), self.y(y_mm + h_mm));
        self.content
            .rect(x, y, w_mm * MM_TO_PT, h_mm * MM_TO_PT);
        self.content.fill_nonzero();
    }

    fn circle_fill(&mut self, cx_mm: f32, cy_mm: f32, r_mm: f32) {
        // Four-arc bezier approximation.
        let k = 0.552_284_8_f32;
        let (cx, cy) = (self.x(cx_mm), self.y(cy_mm));
        let r = r_mm * MM_TO_PT;
        self.content.move_to(cx + r, cy);
        self.content
            .cubic_to(cx + r, cy + k * r, cx + k * r, cy + r, cx, cy + r);
        self.content
            .cubic_to(cx - k * r, cy + r, cx - r, cy + k * r, cx - r, cy);
        self.content
            .cubic_to(cx - r, cy - k * r, cx - k * r, cy - r, cx, cy - r);
        self.content
            .cubic_to(cx + k * r, cy - r, cx + r, cy - k * r, cx + r, cy);
        self.content.fill_nonzero();
    }

    fn set_dash(&mut self, on: f32, off: f32) {
        self.content.set_dash_pattern([on, off], 0.0);
    }

    fn clear_dash(&mut self) {
        self.content.set_dash_pattern(std::iter::empty::<f32>(), 0.0);
    }
}

/// Render the full single-page statement: header band, metadata and
/// statistics lines, two-column roster tables, performance chart, summary
/// grid and signature blocks. An empty roster renders zeroed statistics and
/// bare chart axes; this never fails.
pub fn render_class_report(report: &ClassReport, institution: &str) -> Vec<u8> {
    let catalog_id = Ref::new(1);
    let page_tree_id = Ref::new(2);
    let page_id = Ref::new(3);
    let font_reg_id = Ref::new(4);
    let font_bold_id = Ref::new(5);
    let content_id = Ref::new(6);

    let mut pdf = Pdf::new();
    pdf.catalog(catalog_id).pages(page_tree_id);
    pdf.pages(page_tree_id).kids([page_id]).count(1);

    let mut page = pdf.page(page_id);
    page.media_box(Rect::new(
        0.0,
        0.0,
        PAGE_W_MM * MM_TO_PT,
        PAGE_H_MM * MM_TO_PT,
    ));
    page.parent(page_tree_id);
    page.contents(content_id);
    page.resources()
        .fonts()
        .pair(Name(b"F1"), font_reg_id)
        .pair(Name(b"F2"), font_bold_id);
    page.finish();

    pdf.type1_font(font_reg_id).base_font(Name(b"Helvetica"));
    pdf.type1_font(font_bold_id)
        .base_font(Name(b"Helvetica-Bold"));

    let mut p = Painter::new();
    draw_header(&mut p, report, institution);
    draw_meta_and_stats(&mut p, report);
    let table_end = draw_roster_tables(&mut p, report);
    let chart_end = draw_chart(&mut p, report, table_end + 5.0);
    draw_summary_and_signatures(&mut p, report, chart_end + 10.0);

    pdf.stream(content_id, &p.content.finish());
    pdf.finish()
}

fn draw_header(p: &mut Painter, report: &ClassReport, institution: &str) {
    let (r, g, b) = HEADER_BLUE;
    p.content.set_fill_rgb(r, g, b);
    p.rect_fill(0.0, 0.0, PAGE_W_MM, 25.0);

    p.content.set_fill_rgb(1.0, 1.0, 1.0);
    p.text_centered(
        &format!("{} - MARKS EVALUATION REPORT", institution),
        16.0,
        105.0,
        10.0,
        true,
    );
    p.text_centered(
        &format!(
            "{} - {} ({}) | Class: {}",
            report.test.test_name,
            report.test.subject_name,
            report.test.subject_code,
            report.class_name
        ),
        10.0,
        105.0,
        18.0,
        false,
    );
    p.content.set_fill_rgb(0.0, 0.0, 0.0);
}

fn draw_meta_and_stats(p: &mut Painter, report: &ClassReport) {
    let t = &report.test;
    let s = &report.statistics;

    p.text(&format!("Max Marks: {}", fmt_num(t.max_marks)), 8.0, 14.0, 32.0, false);
    p.text(
        &format!("Converted: {}", fmt_num(t.converted_max_marks)),
        8.0,
        60.0,
        32.0,
        false,
    );
    p.text(&format!("Date: {}", report.generated_on), 8.0, 100.0, 32.0, false);
    p.text(&format!("Students: {}", report.roster.len()), 8.0, 150.0, 32.0, false);

    p.text(&format!("Avg: {}", fmt_num(s.average_raw)), 8.0, 14.0, 38.0, false);
    p.text(&format!("High: {}", fmt_num(s.max_raw)), 8.0, 45.0, 38.0, false);
    p.text(&format!("Low: {}", fmt_num(s.min_raw)), 8.0, 75.0, 38.0, false);
    p.text(
        &format!("Pass: {} ({}%)", s.pass_count, fmt_num(s.pass_percentage)),
        8.0,
        105.0,
        38.0,
        false,
    );
}

/// Returns the y (mm) just below the taller of the two tables.
fn draw_roster_tables(p: &mut Painter, report: &ClassReport) -> f32 {
    let (left, right) = split_roster(&report.roster);
    draw_half_table(p, report, left, 14.0);
    draw_half_table(p, report, right, 111.0);

    let rows = left.len().max(right.len()) as f32;
    TABLE_TOP_MM + TABLE_HEADER_H_MM + rows * TABLE_ROW_H_MM
}

fn draw_half_table(p: &mut Painter, report: &ClassReport, rows: &[RosterRow], x0: f32) {
    let (r, g, b) = HEADER_BLUE;
    p.content.set_fill_rgb(r, g, b);
    p.rect_fill(x0, TABLE_TOP_MM, TABLE_W_MM, TABLE_HEADER_H_MM);

    let headers = [
        "#".to_string(),
        "Roll No".to_string(),
        "Name".to_string(),
        format!("Out of {}", fmt_num(report.test.max_marks)),
        format!("Out of {}", fmt_num(report.test.converted_max_marks)),
    ];
    p.content.set_fill_rgb(1.0, 1.0, 1.0);
    let mut cx = x0;
    for (i, h) in headers.iter().enumerate() {
        p.text_centered(h, 6.0, cx + COL_W_MM[i] / 2.0, TABLE_TOP_MM + 3.5, true);
        cx += COL_W_MM[i];
    }

    p.content.set_fill_rgb(0.0, 0.0, 0.0);
    for (i, row) in rows.iter().enumerate() {
        let ry = TABLE_TOP_MM + TABLE_HEADER_H_MM + i as f32 * TABLE_ROW_H_MM;
        if i % 2 == 1 {
            p.content.set_fill_rgb(0.93, 0.94, 0.95);
            p.rect_fill(x0, ry, TABLE_W_MM, TABLE_ROW_H_MM);
            p.content.set_fill_rgb(0.0, 0.0, 0.0);
        }
        let ty = ry + 3.0;
        let cells = [
            row.rank.to_string(),
            row.student_roll_no.clone(),
            row.student_name.clone(),
            fmt_num(row.marks_obtained),
            fmt_num(row.converted_marks),
        ];
        let mut cx = x0;
        for (c, cell) in cells.iter().enumerate() {
            if c == 2 {
                // Names stay left-aligned like the printed form.
                p.text(cell, 6.0, cx + 1.0, ty, false);
            } else {
                p.text_centered(cell, 6.0, cx + COL_W_MM[c] / 2.0, ty, false);
            }
            cx += COL_W_MM[c];
        }
    }

    p.content.set_stroke_rgb(0.6, 0.6, 0.6);
    p.content.set_line_width(0.3);
    let h = TABLE_HEADER_H_MM + rows.len() as f32 * TABLE_ROW_H_MM;
    p.rect_stroke(x0, TABLE_TOP_MM, TABLE_W_MM, h);
    p.content.set_stroke_rgb(0.0, 0.0, 0.0);
}

/// Line-and-point chart of raw scores over roster order, with gridlines at
/// fixed mark intervals and a dashed class-average overlay. Returns the y
/// (mm) of the chart bottom. Degrades to empty axes on an empty roster.
fn draw_chart(p: &mut Painter, report: &ClassReport, title_y: f32) -> f32 {
    p.text("Performance Chart", 8.0, 14.0, title_y, true);

    let cx0 = 25.0_f32;
    let cy0 = title_y + 8.0;
    let cw = 75.0_f32;
    let ch = 35.0_f32;
    let max_marks = if report.test.max_marks > 0.0 {
        report.test.max_marks
    } else {
        GRID_INTERVAL
    };

    // Axes.
    p.content.set_stroke_rgb(0.4, 0.4, 0.4);
    p.content.set_line_width(0.5);
    p.line(cx0, cy0 + ch, cx0 + cw, cy0 + ch);
    p.line(cx0, cy0, cx0, cy0 + ch);

    // Gridlines and scale labels at fixed mark intervals.
    p.content.set_stroke_rgb(0.86, 0.86, 0.86);
    p.content.set_line_width(0.2);
    let mut mark = 0.0_f64;
    while mark <= max_marks {
        let gy = cy0 + ch - (mark / max_marks) as f32 * ch;
        p.text_right(&fmt_num(mark), 6.0, cx0 - 1.0, gy + 1.0);
        p.set_dash(1.0, 1.0);
        p.line(cx0, gy, cx0 + cw, gy);
        p.clear_dash();
        mark += GRID_INTERVAL;
    }

    p.text("Marks", 7.0, cx0 - 11.0, cy0 - 2.0, true);
    p.text_centered("Students", 7.0, cx0 + cw / 2.0, cy0 + ch + 8.0, true);

    let roster = &report.roster;
    if !roster.is_empty() {
        let spacing = cw / (roster.len().saturating_sub(1).max(1)) as f32;
        let point_y = |raw: f64| cy0 + ch - (raw / max_marks) as f32 * ch;

        let (r, g, b) = HEADER_BLUE;
        p.content.set_stroke_rgb(r, g, b);
        p.content.set_line_width(1.0);
        for w in roster.windows(2) {
            let i = w[0].rank - 1;
            p.line(
                cx0 + i as f32 * spacing,
                point_y(w[0].marks_obtained),
                cx0 + (i + 1) as f32 * spacing,
                point_y(w[1].marks_obtained),
            );
        }

        let (r, g, b) = POINT_RED;
        p.content.set_fill_rgb(r, g, b);
        for (i, row) in roster.iter().enumerate() {
            p.circle_fill(cx0 + i as f32 * spacing, point_y(row.marks_obtained), 1.0);
        }
        p.content.set_fill_rgb(0.0, 0.0, 0.0);

        let avg = report.statistics.average_raw;
        let avg_y = point_y(avg);
        let (r, g, b) = AVG_GREEN;
        p.content.set_stroke_rgb(r, g, b);
        p.content.set_line_width(0.5);
        p.set_dash(2.0, 2.0);
        p.line(cx0, avg_y, cx0 + cw, avg_y);
        p.clear_dash();
        p.content.set_fill_rgb(r, g, b);
        p.text(&format!("Avg: {}", fmt_num(avg)), 6.0, cx0 + cw + 2.0, avg_y + 1.0, false);
        p.content.set_fill_rgb(0.0, 0.0, 0.0);
    }

    p.content.set_stroke_rgb(0.0, 0.0, 0.0);
    cy0 + ch
}

fn draw_summary_and_signatures(p: &mut Painter, report: &ClassReport, top: f32) {
    let s = &report.statistics;
    let x0 = 14.0_f32;
    let w = 90.0_f32;
    let row_h = 6.0_f32;
    let col1 = w * 0.6;
    let col2 = w * 0.4;

    p.text("Summary", 8.0, x0, top, true);

    // Absentees and malpractice are not tracked as mark states; the form
    // keeps the rows and reports zero.
    let rows: [(String, String); 8] = [
        ("Total No. of Students :".into(), s.count.to_string()),
        ("No. of Absentees :".into(), "0".into()),
        ("No. of Students Attended :".into(), s.count.to_string()),
        ("No. of Malpractice :".into(), "0".into()),
        ("No. of Students Passed :".into(), s.pass_count.to_string()),
        (
            "No. of Students Failed :".into(),
            (s.count - s.pass_count).to_string(),
        ),
        (
            format!("Class Average (for {}) :", fmt_num(report.test.max_marks)),
            fmt_num(s.average_raw),
        ),
        ("Pass Percentage :".into(), format!("{}%", fmt_num(s.pass_percentage))),
    ];

    p.content.set_stroke_rgb(0.0, 0.0, 0.0);
    p.content.set_line_width(0.3);
    let mut y = top + 3.0;
    for (label, value) in rows.iter() {
        p.rect_stroke(x0, y, col1, row_h);
        p.rect_stroke(x0 + col1, y, col2, row_h);
        p.text(label, 7.0, x0 + 2.0, y + 4.0, true);
        p.text_centered(value, 7.0, x0 + col1 + col2 / 2.0, y + 4.0, false);
        y += row_h;
    }
    p.rect_stroke(x0, y, w, row_h);
    p.text("Faculty Signature :", 7.0, x0 + 2.0, y + 4.0, true);

    // Counter-signature blocks beside the summary grid; labels only, no
    // signature capture.
    let sig_x = x0 + w + 5.0;
    let sig_w = 90.0_f32;
    let sig_h = 15.0_f32;
    p.text("Signatures", 8.0, sig_x, top, true);
    let mut sy = top + 3.0;
    for label in ["HoD Signature", "VP Exams Signature", "Dean Signature"] {
        p.rect_stroke(sig_x, sy, sig_w, sig_h);
        p.text_centered(label, 7.0, sig_x + sig_w / 2.0, sy + sig_h / 2.0 + 1.0, false);
        sy += sig_h;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc::MarkStatistics;
    use crate::report::{ClassReport, RosterRow};
    use crate::store::TestConfig;

    fn sample_report(n: usize) -> ClassReport {
        let roster: Vec<RosterRow> = (0..n)
            .map(|i| RosterRow {
                rank: i + 1,
                student_roll_no: format!("R{:03}", i + 1),
                student_name: format!("Student {}", i + 1),
                marks_obtained: (i % 50) as f64,
                converted_marks: ((i % 50) as f64) * 0.3,
                remarks: None,
            })
            .collect();
        let raws: Vec<f64> = roster.iter().map(|r| r.marks_obtained).collect();
        ClassReport {
            test: TestConfig {
                id: "t1".into(),
                test_name: "Internal Test 1".into(),
                subject_name: "Physics".into(),
                subject_code: "PHY101".into(),
                max_marks: 50.0,
                converted_max_marks: 15.0,
                test_date: None,
            },
            class_name: "CSE-A".into(),
            generated_on: "01/01/2026".into(),
            statistics: crate::calc::mark_statistics(&raws, 50.0),
            roster,
        }
    }

    #[test]
    fn split_takes_ceil_on_the_left() {
        let v = [1, 2, 3, 4, 5];
        let (l, r) = split_roster(&v);
        assert_eq!(l, &[1, 2, 3]);
        assert_eq!(r, &[4, 5]);

        let v2 = [1, 2, 3, 4];
        let (l2, r2) = split_roster(&v2);
        assert_eq!(l2.len(), 2);
        assert_eq!(r2.len(), 2);
    }

    #[test]
    fn split_concat_preserves_order() {
        let v: Vec<usize> = (0..31).collect();
        let (l, r) = split_roster(&v);
        assert_eq!(l.len(), 16);
        assert_eq!(r.len(), 15);
        let joined: Vec<usize> = l.iter().chain(r.iter()).copied().collect();
        assert_eq!(joined, v);
    }

    #[test]
    fn split_handles_degenerate_sizes() {
        let empty: [u8; 0] = [];
        let (l, r) = split_roster(&empty);
        assert!(l.is_empty() && r.is_empty());

        let one = [7];
        let (l, r) = split_roster(&one);
        assert_eq!(l, &[7]);
        assert!(r.is_empty());
    }

    #[test]
    fn render_produces_a_pdf() {
        let bytes = render_class_report(&sample_report(30), "TEST INSTITUTE");
        assert!(bytes.starts_with(b"%PDF-"));
        assert!(bytes.len() > 2000);
    }

    #[test]
    fn render_empty_roster_does_not_panic() {
        let report = sample_report(0);
        assert_eq!(report.statistics, MarkStatistics::empty());
        let bytes = render_class_report(&report, "TEST INSTITUTE");
        assert!(bytes.starts_with(b"%PDF-"));
    }

    #[test]
    fn render_single_student_does_not_divide_by_zero() {
        let bytes = render_class_report(&sample_report(1), "TEST INSTITUTE");
        assert!(bytes.starts_with(b"%PDF-"));
    }
}
