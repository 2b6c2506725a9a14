use crate::infra::{
    build_pipeline, DEMO_APPELLANT, DEMO_INSTITUTION, SAMPLE_APPROVAL_REF, SAMPLE_ENROLLMENT_REF,
    SAMPLE_LAPSED_APPROVAL_REF, SAMPLE_LAPSED_ENROLLMENT_REF, SAMPLE_RENEWED_APPROVAL_REF,
};
use clap::Args;

use accredit::config::VerificationConfig;
use accredit::error::AppError;
use accredit::verification::{
    AppealVerdict, AuditLog, DocumentType, DocumentUpload, VerificationRun,
};

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Declared student count for the demo institution.
    #[arg(long, default_value_t = 1200)]
    pub(crate) student_count: u32,
    /// Skip the rejection-and-appeal portion of the demo.
    #[arg(long)]
    pub(crate) skip_appeal: bool,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        student_count,
        skip_appeal,
    } = args;

    println!("Institution eligibility demo");
    let (api, store, events) = build_pipeline(VerificationConfig::default());
    let verification = &api.verification;
    let appeals = &api.appeals;

    let institution = match verification.register_institution(DEMO_INSTITUTION, student_count) {
        Ok(institution) => institution,
        Err(err) => {
            println!("  Registration rejected: {err}");
            return Ok(());
        }
    };
    println!(
        "- Registered {} ({}) with {} declared students",
        institution.name, institution.id.0, institution.student_count
    );
    if let Some(deadline) = institution.verification_deadline {
        println!("  Verification deadline: {}", deadline.date_naive());
    }

    for (document_type, file_name, storage_ref) in [
        (
            DocumentType::AicteApproval,
            "aicte-approval.pdf",
            SAMPLE_APPROVAL_REF,
        ),
        (
            DocumentType::EnrollmentData,
            "enrollment-summary.pdf",
            SAMPLE_ENROLLMENT_REF,
        ),
    ] {
        match verification.upload_document(
            &institution.id,
            sample_upload(document_type, file_name, storage_ref),
        ) {
            Ok(document) => println!(
                "- Uploaded {} as {}",
                document.file_name,
                document.document_type.label()
            ),
            Err(err) => {
                println!("  Upload rejected: {err}");
                return Ok(());
            }
        }
    }

    let run = match verification.run_verification(&institution.id).await {
        Ok(run) => run,
        Err(err) => {
            println!("  Verification unavailable: {err}");
            return Ok(());
        }
    };
    render_run(&run);

    match verification.status(&institution.id) {
        Ok(view) => match serde_json::to_string_pretty(&view) {
            Ok(json) => println!("  Dashboard payload:\n{json}"),
            Err(err) => println!("  Dashboard payload unavailable: {err}"),
        },
        Err(err) => println!("  Status lookup failed: {err}"),
    }

    if skip_appeal {
        return Ok(());
    }

    println!("\nRejection and appeal demo");
    let appellant = match verification.register_institution(DEMO_APPELLANT, 800) {
        Ok(institution) => institution,
        Err(err) => {
            println!("  Registration rejected: {err}");
            return Ok(());
        }
    };
    println!("- Registered {} ({})", appellant.name, appellant.id.0);

    for (document_type, file_name, storage_ref) in [
        (
            DocumentType::AicteApproval,
            "aicte-approval-2016.pdf",
            SAMPLE_LAPSED_APPROVAL_REF,
        ),
        (
            DocumentType::EnrollmentData,
            "enrollment-summary.pdf",
            SAMPLE_LAPSED_ENROLLMENT_REF,
        ),
    ] {
        match verification.upload_document(
            &appellant.id,
            sample_upload(document_type, file_name, storage_ref),
        ) {
            Ok(document) => println!(
                "- Uploaded {} as {}",
                document.file_name,
                document.document_type.label()
            ),
            Err(err) => {
                println!("  Upload rejected: {err}");
                return Ok(());
            }
        }
    }

    let run = match verification.run_verification(&appellant.id).await {
        Ok(run) => run,
        Err(err) => {
            println!("  Verification unavailable: {err}");
            return Ok(());
        }
    };
    render_run(&run);

    let appeal = match appeals.submit(
        &appellant.id,
        "Our AICTE approval was renewed this year; the lapsed certificate was uploaded by mistake and the renewal is available on request.",
        Vec::new(),
    ) {
        Ok(appeal) => appeal,
        Err(err) => {
            println!("  Appeal refused: {err}");
            return Ok(());
        }
    };
    println!(
        "- Appeal {} submitted -> {}",
        appeal.id.0,
        appeal.state.label()
    );

    let appeal = match appeals.assign(&appeal.id, "reviewer-demo") {
        Ok(appeal) => appeal,
        Err(err) => {
            println!("  Assignment failed: {err}");
            return Ok(());
        }
    };
    println!("- Assigned to reviewer-demo -> {}", appeal.state.label());

    let appeal = match appeals.request_more_info(
        &appeal.id,
        vec![DocumentType::AicteApproval.label().to_string()],
        "Attach the renewed AICTE approval certificate.",
    ) {
        Ok(appeal) => appeal,
        Err(err) => {
            println!("  Info request failed: {err}");
            return Ok(());
        }
    };
    println!("- More information requested -> {}", appeal.state.label());

    let renewal = match verification.upload_document(
        &appellant.id,
        sample_upload(
            DocumentType::AicteApproval,
            "aicte-renewal-2026.pdf",
            SAMPLE_RENEWED_APPROVAL_REF,
        ),
    ) {
        Ok(document) => document,
        Err(err) => {
            println!("  Upload rejected: {err}");
            return Ok(());
        }
    };
    println!("- Uploaded {} as renewal evidence", renewal.file_name);

    let appeal = match appeals.resubmit(&appeal.id, vec![renewal.id]) {
        Ok(appeal) => appeal,
        Err(err) => {
            println!("  Resubmission failed: {err}");
            return Ok(());
        }
    };
    println!("- Resubmitted with renewal evidence -> {}", appeal.state.label());

    let appeal = match appeals.decide(
        &appeal.id,
        AppealVerdict::Approved,
        "renewed AICTE approval verified with the registry",
        "reviewer-demo",
        Some(14),
    ) {
        Ok(appeal) => appeal,
        Err(err) => {
            println!("  Decision failed: {err}");
            return Ok(());
        }
    };
    println!("- Appeal decided -> {}", appeal.state.label());

    match verification.status(&appellant.id) {
        Ok(view) => {
            println!(
                "  {} is now {} in the {} tier",
                view.institution.name,
                view.institution.status.label(),
                view.institution
                    .tier
                    .map(|tier| tier.label())
                    .unwrap_or("unassigned")
            );
            if let Some(deadline) = view.institution.verification_deadline {
                println!("  Extended deadline: {}", deadline.date_naive());
            }
        }
        Err(err) => println!("  Status lookup failed: {err}"),
    }

    match store.by_institution(&appellant.id) {
        Ok(trail) => {
            println!("  Audit trail:");
            for record in trail {
                println!(
                    "    - #{} {} by {}",
                    record.seq,
                    record.action.label(),
                    record.actor
                );
            }
        }
        Err(err) => println!("  Audit trail unavailable: {err}"),
    }

    let dispatched = events.events();
    if dispatched.is_empty() {
        println!("  Outbound events: none dispatched");
    } else {
        println!("  Outbound events:");
        for event in dispatched {
            println!(
                "    - {} -> {}",
                event.kind.label(),
                event.institution_id.0
            );
        }
    }

    Ok(())
}

fn sample_upload(document_type: DocumentType, file_name: &str, storage_ref: &str) -> DocumentUpload {
    DocumentUpload {
        document_type,
        file_name: file_name.to_string(),
        content_type: "application/pdf".to_string(),
        size_bytes: 182_000,
        storage_ref: storage_ref.to_string(),
    }
}

fn render_run(run: &VerificationRun) {
    println!(
        "  Decision: {} ({})",
        run.decision.status.label(),
        run.decision.reason
    );
    if let Some(tier) = run.decision.tier {
        println!("  Tier: {}", tier.label());
    }
    for analysis in &run.analyses {
        println!(
            "  - {}: authenticity {:.2}, completeness {:.2}",
            analysis.document_type.label(),
            analysis.authenticity_score,
            analysis.completeness_score
        );
        for flag in &analysis.red_flags {
            println!(
                "    - [{}] {}: {}",
                flag.severity.label(),
                flag.kind.label(),
                flag.description
            );
        }
    }
    for result in &run.registry_results {
        println!(
            "  - {} reports {} for {}",
            result.registry,
            result.status.label(),
            result.approval_number
        );
    }
    for note in &run.degraded {
        println!("  - degraded: {note}");
    }
}
