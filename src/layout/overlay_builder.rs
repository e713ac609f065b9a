//! Turn grading results into overlay primitives
//!
//! Marks go on the image at the answer's scaled location. Question labels and
//! analysis text flow down a side panel to the right of the image, driven by
//! a single vertical cursor.

use std::collections::HashSet;

use super::geometry::{check, ellipse, side_panel};
use super::text_flow::TextFlow;
use crate::config::TextConfig;
use crate::domain::{
    AnswerStep, BoxRect, CheckMark, DisplayTransform, EllipseMark, MarkColor, OverlayPrimitive,
    Question, StepVerdict, TextBox, TextLabel,
};

/// Fonts and widths for side panel text
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlayStyle {
    pub analysis_max_width: f64,
    pub analysis_font_size: f64,
    pub question_font_size: f64,
    pub line_height_ratio: f64,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self::from(&TextConfig::default())
    }
}

impl From<&TextConfig> for OverlayStyle {
    fn from(config: &TextConfig) -> Self {
        Self {
            analysis_max_width: config.analysis_max_width,
            analysis_font_size: config.analysis_font_size,
            question_font_size: config.question_font_size,
            line_height_ratio: config.line_height_ratio,
        }
    }
}

impl StepVerdict {
    /// Stroke color of the image mark, and text color of the analysis box
    pub fn mark_color(self) -> MarkColor {
        match self {
            StepVerdict::Correct | StepVerdict::Incorrect => MarkColor::Red,
            StepVerdict::DisputedCorrect => MarkColor::Purple,
            StepVerdict::DisputedIncorrect => MarkColor::Orange,
        }
    }
}

/// Builds overlay primitives for one grading record
#[derive(Clone, Copy, Debug, Default)]
pub struct OverlayBuilder {
    style: OverlayStyle,
}

/// Vertical layout state of the side panel
struct SidePanel {
    x: f64,
    cursor_y: f64,
    labelled: HashSet<String>,
}

impl SidePanel {
    fn new(display_width: f64) -> Self {
        Self {
            x: display_width + side_panel::MARGIN_X,
            cursor_y: side_panel::START_Y,
            labelled: HashSet::new(),
        }
    }
}

impl OverlayBuilder {
    pub fn new(style: OverlayStyle) -> Self {
        Self { style }
    }

    pub fn style(&self) -> &OverlayStyle {
        &self.style
    }

    fn analysis_flow(&self) -> TextFlow {
        TextFlow::new(self.style.analysis_max_width, self.style.analysis_font_size)
            .with_line_height(self.style.line_height_ratio)
    }

    /// Build primitives for `questions` drawn over an image shown at `transform`
    ///
    /// Output order follows the input: each step's image mark, then its
    /// question label (first time only), then its analysis box. The result
    /// depends only on the arguments.
    pub fn build(
        &self,
        questions: &[Question],
        transform: &DisplayTransform,
    ) -> Vec<OverlayPrimitive> {
        let mut primitives = Vec::new();
        let mut panel = SidePanel::new(transform.display_width);

        for (q_index, question) in questions.iter().enumerate() {
            if question.kind.is_none() {
                log::debug!("Skipping question {} without a type", question.number);
                continue;
            }

            let mut wrote_analysis = false;
            for step in &question.steps {
                let verdict = step.verdict();
                let area = step.location.scaled(transform);

                if verdict == StepVerdict::Correct {
                    primitives.push(OverlayPrimitive::Check(check_mark(&area, transform)));
                    continue;
                }

                primitives.push(OverlayPrimitive::Ellipse(ellipse_mark(
                    &area,
                    transform,
                    verdict.mark_color(),
                )));
                if let Some(label) = self.question_label(&mut panel, question) {
                    primitives.push(OverlayPrimitive::TextLabel(label));
                }
                primitives.push(OverlayPrimitive::TextBox(self.analysis_box(
                    &mut panel, q_index, question, step, verdict,
                )));
                wrote_analysis = true;
            }

            if wrote_analysis {
                panel.cursor_y += side_panel::QUESTION_GAP;
            }
        }

        primitives
    }

    fn question_label(&self, panel: &mut SidePanel, question: &Question) -> Option<TextLabel> {
        if !panel.labelled.insert(question.number.clone()) {
            return None;
        }
        let label = TextLabel {
            x: panel.x,
            y: panel.cursor_y,
            width: side_panel::LABEL_WIDTH,
            height: side_panel::LABEL_HEIGHT,
            text: format!("题号: {} ", question.number),
            font_size: self.style.question_font_size,
            color: MarkColor::Ink,
        };
        panel.cursor_y += side_panel::LABEL_ADVANCE;
        Some(label)
    }

    fn analysis_box(
        &self,
        panel: &mut SidePanel,
        q_index: usize,
        question: &Question,
        step: &AnswerStep,
        verdict: StepVerdict,
    ) -> TextBox {
        let analysis = step.analysis_for(verdict);
        let text = if question.has_multiple_steps() {
            format!("({}) {}", step.step_id, analysis)
        } else {
            analysis.to_string()
        };

        let flow = self.analysis_flow();
        let lines = flow.wrap(&text);
        let height = flow.height_of(&text, &lines);

        let text_box = TextBox {
            id: format!("analysis_box_{}_{}_red", q_index, step.step_id),
            x: panel.x,
            y: panel.cursor_y + side_panel::BOX_OFFSET_Y,
            width: flow.max_width,
            height,
            text,
            lines,
            font_size: flow.font_size,
            border: MarkColor::White,
            text_color: verdict.mark_color(),
        };
        panel.cursor_y += height + side_panel::BOX_GAP;
        text_box
    }
}

/// Tick resting on the bottom centre of the answer box
fn check_mark(area: &BoxRect, transform: &DisplayTransform) -> CheckMark {
    let (width, height) = (area.width(), area.height());
    let size = check::size(width, height, transform.display_width);
    let anchor_x = area.x1 + width / 2.0;
    let anchor_y = area.y1 + height;

    CheckMark {
        x: anchor_x - size,
        y: anchor_y - size,
        size,
        points: check::points(size),
        color: MarkColor::Red,
        stroke_width: check::STROKE_WIDTH,
        roughness: check::ROUGHNESS,
    }
}

fn ellipse_mark(area: &BoxRect, transform: &DisplayTransform, color: MarkColor) -> EllipseMark {
    let (width, height) = (area.width(), area.height());
    let factor = ellipse::scale_factor(width, transform.display_width);

    EllipseMark {
        x: area.x1 - width * factor * ellipse::OFFSET_RATIO,
        y: area.y1 - height * factor * ellipse::OFFSET_RATIO,
        width: width * factor,
        height: height * factor,
        color,
        stroke_width: ellipse::STROKE_WIDTH,
        roughness: ellipse::ROUGHNESS,
    }
}

/// Build with the default side panel style
pub fn build(questions: &[Question], transform: &DisplayTransform) -> Vec<OverlayPrimitive> {
    OverlayBuilder::default().build(questions, transform)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{QuestionType, SecondaryResult};
    use crate::layout::text_flow::measure_height;

    fn step(id: i64, is_correct: bool, consistent: bool, analysis: &str) -> AnswerStep {
        AnswerStep {
            step_id: id,
            student_answer: "x".to_string(),
            primary_analysis: analysis.to_string(),
            is_correct,
            location: BoxRect::new(100.0, 100.0, 300.0, 200.0),
            models_consistent: consistent,
            secondary_result: Some(SecondaryResult {
                student_answer: "x".to_string(),
                analysis: format!("secondary {analysis}"),
                is_correct: !is_correct,
            }),
        }
    }

    fn question(number: &str, steps: Vec<AnswerStep>) -> Question {
        Question {
            number: number.to_string(),
            kind: Some(QuestionType::FillBlank),
            text: String::new(),
            steps,
        }
    }

    fn transform() -> DisplayTransform {
        DisplayTransform::fit(1000, 800, 1440, 1440)
    }

    fn text_boxes(primitives: &[OverlayPrimitive]) -> Vec<&TextBox> {
        primitives
            .iter()
            .filter_map(|p| match p {
                OverlayPrimitive::TextBox(b) => Some(b),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_each_verdict_has_its_mark_and_text_source() {
        let cases = [
            (true, true, None),
            (true, false, Some((MarkColor::Purple, "secondary b"))),
            (false, false, Some((MarkColor::Orange, "c"))),
            (false, true, Some((MarkColor::Red, "d"))),
        ];
        let analyses = ["a", "b", "c", "d"];

        for ((is_correct, consistent, expected), analysis) in cases.into_iter().zip(analyses) {
            let questions = [question("1", vec![step(1, is_correct, consistent, analysis)])];
            let primitives = build(&questions, &transform());
            match expected {
                None => {
                    assert_eq!(primitives.len(), 1);
                    assert!(matches!(
                        &primitives[0],
                        OverlayPrimitive::Check(c) if c.color == MarkColor::Red
                    ));
                }
                Some((color, text)) => {
                    assert_eq!(primitives.len(), 3);
                    assert!(matches!(
                        &primitives[0],
                        OverlayPrimitive::Ellipse(e) if e.color == color
                    ));
                    assert!(matches!(
                        &primitives[1],
                        OverlayPrimitive::TextLabel(l) if l.text == "题号: 1 "
                    ));
                    let boxes = text_boxes(&primitives);
                    assert_eq!(boxes[0].text, text);
                    assert_eq!(boxes[0].text_color, color);
                }
            }
        }
    }

    #[test]
    fn test_two_question_scenario_side_panel_flow() {
        let analysis = "计算错误，应先算乘法再算加法";
        let questions = [
            question("1", vec![step(1, true, true, "ok")]),
            question("2", vec![step(1, false, true, analysis)]),
        ];
        let primitives = build(&questions, &transform());

        assert_eq!(primitives.len(), 4);
        let OverlayPrimitive::Check(check) = &primitives[0] else {
            panic!("expected a check first, got {:?}", primitives[0]);
        };
        // 200x100 box: size = 0.75 * min(120, max(60, 60, 40))
        assert!((check.size - 45.0).abs() < 1e-9);
        assert!((check.x - (200.0 - 45.0)).abs() < 1e-9);
        assert!((check.y - (200.0 - 45.0)).abs() < 1e-9);

        assert!(matches!(primitives[1], OverlayPrimitive::Ellipse(_)));
        let OverlayPrimitive::TextLabel(label) = &primitives[2] else {
            panic!("expected a label");
        };
        assert_eq!((label.x, label.y), (1020.0, 20.0));

        let OverlayPrimitive::TextBox(text_box) = &primitives[3] else {
            panic!("expected an analysis box");
        };
        // Cursor: 20 start, +12 after the label, box sits 20 below it
        assert_eq!((text_box.x, text_box.y), (1020.0, 52.0));
        assert_eq!(text_box.width, 400.0);
        assert_eq!(text_box.height, measure_height(analysis, 400.0, 20.0));
        assert_eq!(text_box.id, "analysis_box_1_1_red");
    }

    #[test]
    fn test_cursor_advances_between_questions() {
        let questions = [
            question("1", vec![step(1, false, true, "短")]),
            question("2", vec![step(1, false, true, "短")]),
        ];
        let boxes_y: Vec<f64> = text_boxes(&build(&questions, &transform()))
            .iter()
            .map(|b| b.y)
            .collect();
        // Cursor 32 after the first label, then + 25 (one line) + 12 + 20 question gap,
        // + 12 for the second label, box 20 below that
        assert_eq!(boxes_y, [52.0, 121.0]);
    }

    #[test]
    fn test_label_emitted_once_per_question_and_steps_prefixed() {
        let questions = [question(
            "7",
            vec![step(1, false, true, "first"), step(2, false, false, "second")],
        )];
        let primitives = build(&questions, &transform());
        let labels = primitives
            .iter()
            .filter(|p| matches!(p, OverlayPrimitive::TextLabel(_)))
            .count();
        assert_eq!(labels, 1);
        let boxes = text_boxes(&primitives);
        assert_eq!(boxes[0].text, "(1) first");
        assert_eq!(boxes[1].text, "(2) second");
        assert_eq!(boxes[1].y, boxes[0].y + boxes[0].height + 12.0);
    }

    #[test]
    fn test_correct_only_question_adds_no_gap() {
        let questions = [
            question("1", vec![step(1, true, true, "")]),
            question("2", vec![step(1, false, true, "x")]),
        ];
        let primitives = build(&questions, &transform());
        let boxes = text_boxes(&primitives);
        assert_eq!(boxes[0].y, 52.0);
    }

    #[test]
    fn test_untyped_question_is_skipped() {
        let mut untyped = question("1", vec![step(1, false, true, "x")]);
        untyped.kind = None;
        assert!(build(&[untyped], &transform()).is_empty());
    }

    #[test]
    fn test_marks_use_display_coordinates() {
        let scaled = DisplayTransform::fit(2000, 1000, 1000, 1000);
        let questions = [question("1", vec![step(1, false, true, "x")])];
        let primitives = build(&questions, &scaled);
        let OverlayPrimitive::Ellipse(e) = &primitives[0] else {
            panic!("expected an ellipse");
        };
        // Box scales to 50,50 - 150,100; 100px wide on a 1000px display
        let factor = ellipse::scale_factor(100.0, 1000.0);
        assert!((e.width - 100.0 * factor).abs() < 1e-9);
        assert!((e.x - (50.0 - 100.0 * factor * 0.2)).abs() < 1e-9);
        let OverlayPrimitive::TextLabel(label) = &primitives[1] else {
            panic!("expected a label");
        };
        assert_eq!(label.x, 1020.0);
    }

    #[test]
    fn test_build_is_idempotent() {
        let questions = [
            question("1", vec![step(1, true, false, "甲"), step(2, false, true, "乙")]),
            question("2", vec![step(1, true, true, "丙")]),
        ];
        let first = build(&questions, &transform());
        let second = build(&questions, &transform());
        assert_eq!(first, second);
    }

    #[test]
    fn test_style_from_config() {
        let config = TextConfig {
            analysis_max_width: 200.0,
            ..TextConfig::default()
        };
        let builder = OverlayBuilder::new(OverlayStyle::from(&config));
        let questions = [question("1", vec![step(1, false, true, "x")])];
        let boxes_width: Vec<f64> = text_boxes(&builder.build(&questions, &transform()))
            .iter()
            .map(|b| b.width)
            .collect();
        assert_eq!(boxes_width, [200.0]);
    }
}
