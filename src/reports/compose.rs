//! Turns a report snapshot and its aggregates into document blocks.

use chrono::NaiveDateTime;

use super::aggregate::{summarize, ActivityCounts, GradeSummary, ReportSummary};
use super::document::{truncate, Block, Document, KeyValueStyle, Table, TextStyle};
use super::source::{CareerRecord, EnrollmentRecord, GradeSheet, InstructorRecord, ReportData, StudentRecord};
use crate::authz::Principal;

const INCH: f32 = 72.0;

/// Who asked for the report and when, stamped into the metadata block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportContext {
    pub generated_by: String,
    pub role: Option<String>,
    pub generated_at: NaiveDateTime,
}

impl ReportContext {
    pub fn for_principal(principal: &Principal, generated_at: NaiveDateTime) -> Self {
        Self {
            generated_by: principal.username.clone(),
            role: principal.primary_role().map(str::to_string),
            generated_at,
        }
    }
}

fn metadata(ctx: &ReportContext, extra: Vec<(&str, String)>) -> Block {
    let mut pairs = vec![
        ("Generado por:".to_string(), ctx.generated_by.clone()),
        ("Fecha:".to_string(), ctx.generated_at.format("%d/%m/%Y").to_string()),
        ("Hora:".to_string(), ctx.generated_at.format("%H:%M:%S").to_string()),
        ("Rol:".to_string(), ctx.role.clone().unwrap_or_else(|| "N/A".to_string())),
    ];
    pairs.extend(extra.into_iter().map(|(key, value)| (format!("{key}:"), value)));
    Block::KeyValue {
        style: KeyValueStyle::Metadata,
        pairs,
    }
}

fn summary_box(pairs: Vec<(&str, String)>) -> Block {
    Block::KeyValue {
        style: KeyValueStyle::Summary,
        pairs: pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
    }
}

fn signatures(names: &[&str]) -> Block {
    Block::Signatures(names.iter().map(|n| n.to_string()).collect())
}

/// Start of every report: metadata stamp followed by the title.
fn opening(title: &str, ctx: &ReportContext, extra: Vec<(&str, String)>) -> Document {
    let mut doc = Document::new(title);
    doc.push(metadata(ctx, extra))
        .spacer(0.3 * INCH)
        .text(TextStyle::Title, title);
    doc
}

fn grade_cell(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.0}")).unwrap_or_else(|| "-".to_string())
}

pub fn compose(data: &ReportData, summary: &ReportSummary, ctx: &ReportContext) -> Document {
    match (data, summary) {
        (ReportData::Students { records, career, active }, ReportSummary::Students(counts)) => {
            students(records, career.as_deref(), *active, counts, ctx)
        }
        (ReportData::Grades(sheet), ReportSummary::Grades(grades)) => grade_certificate(sheet, grades, ctx),
        (ReportData::Instructors(records), ReportSummary::Instructors { active }) => {
            instructors(records, *active, ctx)
        }
        (ReportData::Careers(records), ReportSummary::Careers { careers, students }) => {
            self::careers(records, *careers, *students, ctx)
        }
        (ReportData::Enrollments { year, records }, ReportSummary::Enrollments { by_status, total }) => {
            enrollments(*year, records, by_status, *total, ctx)
        }
        (data, _) => compose(data, &summarize(data), ctx),
    }
}

fn filters_description(career: Option<&str>, active: Option<bool>) -> String {
    let mut parts = Vec::new();
    if let Some(career) = career {
        parts.push(format!("Carrera: {career}"));
    }
    match active {
        Some(true) => parts.push("Estado: Activos".to_string()),
        Some(false) => parts.push("Estado: Inactivos".to_string()),
        None => {}
    }
    if parts.is_empty() {
        "Ninguno".to_string()
    } else {
        parts.join(", ")
    }
}

fn students(
    records: &[StudentRecord],
    career: Option<&str>,
    active: Option<bool>,
    counts: &ActivityCounts,
    ctx: &ReportContext,
) -> Document {
    let mut doc = opening(
        "REPORTE DE ESTUDIANTES",
        ctx,
        vec![
            ("Total Registros", records.len().to_string()),
            ("Filtros Aplicados", filters_description(career, active)),
        ],
    );

    doc.push(summary_box(vec![
        ("Total", counts.total.to_string()),
        ("Activos", counts.active.to_string()),
        ("Inactivos", counts.inactive.to_string()),
    ]))
    .spacer(0.2 * INCH);

    if records.is_empty() {
        doc.paragraph("No se encontraron estudiantes con los filtros aplicados.");
    } else {
        let mut table = Table::new(
            ["Código", "Nombre Completo", "CI", "Carrera", "Estado"],
            vec![1.2 * INCH, 2.0 * INCH, 1.0 * INCH, 2.0 * INCH, 0.8 * INCH],
        );
        for student in records {
            table.push_row(vec![
                student.code.clone().unwrap_or_else(|| "N/A".to_string()),
                student.full_name.clone(),
                student.document_number.clone(),
                truncate(student.career.as_deref().unwrap_or("Sin carrera"), 30),
                if student.active { "Activo" } else { "Inactivo" }.to_string(),
            ]);
        }
        doc.heading("Listado de Estudiantes").push(Block::Table(table));
    }

    doc.push(signatures(&["Secretaria General", "Director Académico"]));
    doc
}

fn grade_certificate(sheet: &GradeSheet, summary: &GradeSummary, ctx: &ReportContext) -> Document {
    let code = sheet.student_code.clone().unwrap_or_else(|| "N/A".to_string());
    let mut doc = opening(
        "CERTIFICADO DE NOTAS",
        ctx,
        vec![
            ("Estudiante", sheet.student_name.clone()),
            ("Carrera", sheet.career.clone()),
            ("Gestión", sheet.year.to_string()),
            ("Periodo", sheet.period.clone()),
        ],
    );

    doc.heading("Información del Estudiante")
        .push(Block::KeyValue {
            style: KeyValueStyle::Metadata,
            pairs: vec![
                ("Nombre:".to_string(), sheet.student_name.clone()),
                ("CI:".to_string(), sheet.document_number.clone()),
                ("Código:".to_string(), code),
                ("Carrera:".to_string(), sheet.career.clone()),
                ("Gestión:".to_string(), format!("{} - Periodo {}", sheet.year, sheet.period)),
            ],
        })
        .spacer(0.3 * INCH);

    if sheet.lines.is_empty() {
        doc.paragraph("No se registraron calificaciones para esta inscripción.");
    } else {
        let mut table = Table::new(
            ["Materia", "1er Parcial", "2do Parcial", "3er Parcial", "Final", "Estado"],
            vec![2.5 * INCH, 0.8 * INCH, 0.8 * INCH, 0.8 * INCH, 0.8 * INCH, 1.0 * INCH],
        );
        for (line, result) in sheet.lines.iter().zip(&summary.lines) {
            table.push_row(vec![
                truncate(&line.course, 35),
                grade_cell(line.first_partial),
                grade_cell(line.second_partial),
                grade_cell(line.third_partial),
                grade_cell(result.final_grade),
                result.outcome.label().to_string(),
            ]);
        }

        let average = summary
            .general_average
            .map(|v| format!("{v:.2}"))
            .unwrap_or_else(|| "-".to_string());

        doc.heading("Registro de Calificaciones")
            .push(Block::Table(table))
            .push(summary_box(vec![
                ("Total Materias", summary.total().to_string()),
                ("Aprobadas", summary.approved.to_string()),
                ("Reprobadas", summary.failed.to_string()),
                ("Pendientes", summary.pending.to_string()),
                ("Promedio General", average),
            ]))
            .spacer(0.2 * INCH);
    }

    doc.push(signatures(&["Secretaria Académica", "Director de Carrera"]));
    doc
}

fn instructors(records: &[InstructorRecord], active: usize, ctx: &ReportContext) -> Document {
    let mut doc = opening(
        "REPORTE DE DOCENTES",
        ctx,
        vec![("Total Docentes", records.len().to_string())],
    );

    doc.push(summary_box(vec![("Total de Docentes Activos", active.to_string())]))
        .spacer(0.2 * INCH);

    if records.is_empty() {
        doc.paragraph("No se encontraron docentes activos.");
    } else {
        let mut table = Table::new(
            ["Código", "Nombre Completo", "Grado", "Materias Asignadas"],
            vec![1.0 * INCH, 2.5 * INCH, 1.5 * INCH, 1.0 * INCH],
        );
        for instructor in records {
            table.push_row(vec![
                instructor.code.clone().unwrap_or_else(|| "N/A".to_string()),
                truncate(&instructor.full_name, 40),
                truncate(instructor.degree.as_deref().unwrap_or("N/A"), 25),
                instructor.assigned_courses.to_string(),
            ]);
        }
        doc.heading("Listado de Docentes").push(Block::Table(table));
    }

    doc.push(signatures(&["Director Académico", "Recursos Humanos"]));
    doc
}

fn careers(records: &[CareerRecord], careers: usize, students: i64, ctx: &ReportContext) -> Document {
    let mut doc = opening("REPORTE DE CARRERAS", ctx, Vec::new());

    if records.is_empty() {
        doc.paragraph("No se encontraron carreras activas.");
    } else {
        let mut table = Table::new(
            ["Código", "Nombre", "Tipo", "Estudiantes", "Materias"],
            vec![1.0 * INCH, 2.5 * INCH, 1.0 * INCH, 1.0 * INCH, 0.8 * INCH],
        );
        for career in records {
            table.push_row(vec![
                career.code.clone(),
                truncate(&career.name, 40),
                career.kind.clone(),
                career.students.to_string(),
                career.courses.to_string(),
            ]);
        }
        doc.heading("Listado de Carreras").push(Block::Table(table));
    }

    doc.push(summary_box(vec![
        ("Total Carreras Activas", careers.to_string()),
        ("Total Estudiantes", students.to_string()),
    ]))
    .spacer(0.2 * INCH)
    .push(signatures(&["Director General", "Secretaria Académica"]));
    doc
}

fn enrollments(
    year: i32,
    records: &[EnrollmentRecord],
    by_status: &[(String, usize)],
    total: usize,
    ctx: &ReportContext,
) -> Document {
    let mut doc = opening(
        &format!("REPORTE DE INSCRIPCIONES - GESTIÓN {year}"),
        ctx,
        vec![
            ("Gestión", year.to_string()),
            ("Total Inscripciones", records.len().to_string()),
        ],
    );

    if records.is_empty() {
        doc.paragraph(format!("No se registraron inscripciones en la gestión {year}."));
    } else {
        let mut table = Table::new(
            ["Estudiante", "Carrera", "Periodo", "Estado", "Fecha"],
            vec![2.0 * INCH, 1.8 * INCH, 0.7 * INCH, 1.0 * INCH, 1.0 * INCH],
        );
        for enrollment in records {
            table.push_row(vec![
                truncate(&enrollment.student_name, 30),
                truncate(&enrollment.career, 25),
                enrollment.period.clone(),
                enrollment.status.clone(),
                enrollment.enrolled_on.format("%d/%m/%Y").to_string(),
            ]);
        }
        doc.heading(format!("Inscripciones Gestión {year}"))
            .push(Block::Table(table));
    }

    let mut pairs: Vec<(&str, String)> = by_status
        .iter()
        .map(|(status, count)| (status.as_str(), count.to_string()))
        .collect();
    pairs.push(("Total", total.to_string()));

    doc.push(summary_box(pairs))
        .spacer(0.2 * INCH)
        .push(signatures(&["Secretaria General"]));
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::source::GradeLine;
    use chrono::NaiveDate;

    fn ctx() -> ReportContext {
        ReportContext {
            generated_by: "secretaria".to_string(),
            role: Some("Secretaria".to_string()),
            generated_at: NaiveDate::from_ymd_opt(2025, 3, 1)
                .unwrap()
                .and_hms_opt(10, 30, 0)
                .unwrap(),
        }
    }

    fn student(id: i64, name: &str, active: bool) -> StudentRecord {
        StudentRecord {
            id,
            code: Some(format!("EST-{id:03}")),
            full_name: name.to_string(),
            document_number: format!("{id}000"),
            career: Some("Contaduría General con Mención en Auditoría Financiera".to_string()),
            active,
        }
    }

    fn students_data() -> ReportData {
        ReportData::Students {
            records: vec![
                student(1, "Ana Quispe Mamani", true),
                student(2, "Luis Condori", true),
                student(3, "Rosa Apaza", false),
            ],
            career: Some("Contaduría".to_string()),
            active: None,
        }
    }

    #[test]
    fn student_report_has_summary_and_rows() {
        let data = students_data();
        let doc = compose(&data, &summarize(&data), &ctx());

        let summary = doc.summary().unwrap();
        assert_eq!(
            summary,
            &[
                ("Total".to_string(), "3".to_string()),
                ("Activos".to_string(), "2".to_string()),
                ("Inactivos".to_string(), "1".to_string()),
            ]
        );

        let table = doc.tables().next().unwrap();
        assert_eq!(table.header[0], "Código");
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[0][3].chars().count(), 30);
        assert_eq!(table.rows[2][4], "Inactivo");
    }

    #[test]
    fn metadata_carries_requester_and_filters() {
        let data = students_data();
        let doc = compose(&data, &summarize(&data), &ctx());

        let Block::KeyValue { pairs, .. } = &doc.blocks[0] else {
            panic!("first block should be metadata");
        };
        assert!(pairs.contains(&("Generado por:".to_string(), "secretaria".to_string())));
        assert!(pairs.contains(&("Fecha:".to_string(), "01/03/2025".to_string())));
        assert!(pairs.contains(&("Filtros Aplicados:".to_string(), "Carrera: Contaduría".to_string())));
    }

    #[test]
    fn empty_student_report_says_so() {
        let data = ReportData::Students {
            records: Vec::new(),
            career: None,
            active: Some(true),
        };
        let doc = compose(&data, &summarize(&data), &ctx());

        assert_eq!(doc.tables().count(), 0);
        assert!(doc.blocks.iter().any(|b| matches!(
            b,
            Block::Text { style: TextStyle::Body, text } if text.starts_with("No se encontraron")
        )));
    }

    #[test]
    fn certificate_uses_fallback_final_and_labels() {
        let data = ReportData::Grades(GradeSheet {
            enrollment_id: 5,
            student_code: Some("EST-001".to_string()),
            student_name: "Ana Quispe".to_string(),
            career: "Contaduría".to_string(),
            year: 2025,
            period: "I".to_string(),
            lines: vec![
                GradeLine {
                    course: "Contabilidad Básica".to_string(),
                    first_partial: Some(80.0),
                    second_partial: None,
                    third_partial: Some(60.0),
                    final_grade: None,
                },
                GradeLine {
                    course: "Inglés Técnico".to_string(),
                    first_partial: None,
                    second_partial: None,
                    third_partial: None,
                    final_grade: None,
                },
            ],
            ..GradeSheet::default()
        });
        let doc = compose(&data, &summarize(&data), &ctx());

        let table = doc.tables().next().unwrap();
        assert_eq!(table.rows[0][2], "-");
        assert_eq!(table.rows[0][4], "70");
        assert_eq!(table.rows[0][5], "Aprobado");
        assert_eq!(table.rows[1][5], "Pendiente");

        let summary = doc.summary().unwrap();
        assert!(summary.contains(&("Promedio General".to_string(), "70.00".to_string())));
        assert!(summary.contains(&("Pendientes".to_string(), "1".to_string())));
    }

    #[test]
    fn mismatched_summary_is_recomputed() {
        let data = students_data();
        let doc = compose(&data, &ReportSummary::Instructors { active: 0 }, &ctx());
        assert_eq!(doc.summary().unwrap()[0].1, "3");
    }

    #[test]
    fn composition_is_deterministic() {
        let data = students_data();
        let first = compose(&data, &summarize(&data), &ctx());
        let second = compose(&data, &summarize(&data), &ctx());
        assert_eq!(first, second);
    }
}
