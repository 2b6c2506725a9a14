use std::collections::BTreeMap;
use std::sync::Mutex;

use super::audit::{AuditEntry, AuditError, AuditLog, AuditQuery, AuditRecord};
use super::domain::{
    AnalysisResult, Appeal, AppealId, DocumentId, EligibilityDecision, Institution, InstitutionId,
    RegistryVerificationResult, VerificationDocument,
};
use super::repository::{
    AppealFilter, AppealRepository, DecisionFilter, InstitutionRepository, RepositoryError,
};

/// In-memory store implementing every storage trait over one mutex.
///
/// The single lock is what makes the paired writes transactional: a status
/// change and its audit entry become visible together or not at all.
#[derive(Default)]
pub struct InMemoryVerificationStore {
    inner: Mutex<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    institutions: BTreeMap<InstitutionId, Institution>,
    documents: BTreeMap<DocumentId, VerificationDocument>,
    registry_checks: BTreeMap<InstitutionId, Vec<RegistryVerificationResult>>,
    decisions: Vec<EligibilityDecision>,
    appeals: BTreeMap<AppealId, Appeal>,
    audit: Vec<AuditRecord>,
    next_seq: u64,
}

impl StoreInner {
    fn append_audit(&mut self, entry: AuditEntry) -> AuditRecord {
        self.next_seq += 1;
        let record = AuditRecord::from_entry(self.next_seq, entry);
        self.audit.push(record.clone());
        record
    }
}

impl InMemoryVerificationStore {
    fn lock(&self) -> std::sync::MutexGuard<'_, StoreInner> {
        self.inner.lock().expect("verification store mutex poisoned")
    }
}

impl InstitutionRepository for InMemoryVerificationStore {
    fn insert_institution(
        &self,
        institution: Institution,
        audit: AuditEntry,
    ) -> Result<Institution, RepositoryError> {
        let mut inner = self.lock();
        if inner.institutions.contains_key(&institution.id) {
            return Err(RepositoryError::Conflict);
        }
        inner
            .institutions
            .insert(institution.id.clone(), institution.clone());
        inner.append_audit(audit);
        Ok(institution)
    }

    fn fetch_institution(
        &self,
        id: &InstitutionId,
    ) -> Result<Option<Institution>, RepositoryError> {
        Ok(self.lock().institutions.get(id).cloned())
    }

    fn update_status(
        &self,
        institution: Institution,
        audit: AuditEntry,
    ) -> Result<(), RepositoryError> {
        let mut inner = self.lock();
        if !inner.institutions.contains_key(&institution.id) {
            return Err(RepositoryError::NotFound);
        }
        inner
            .institutions
            .insert(institution.id.clone(), institution);
        inner.append_audit(audit);
        Ok(())
    }

    fn add_document(
        &self,
        document: VerificationDocument,
        audit: AuditEntry,
    ) -> Result<VerificationDocument, RepositoryError> {
        let mut inner = self.lock();
        if !inner.institutions.contains_key(&document.institution_id) {
            return Err(RepositoryError::NotFound);
        }
        if inner.documents.contains_key(&document.id) {
            return Err(RepositoryError::Conflict);
        }
        inner.documents.insert(document.id.clone(), document.clone());
        inner.append_audit(audit);
        Ok(document)
    }

    fn fetch_document(
        &self,
        id: &DocumentId,
    ) -> Result<Option<VerificationDocument>, RepositoryError> {
        Ok(self.lock().documents.get(id).cloned())
    }

    fn documents_for(
        &self,
        id: &InstitutionId,
    ) -> Result<Vec<VerificationDocument>, RepositoryError> {
        Ok(self
            .lock()
            .documents
            .values()
            .filter(|document| document.institution_id == *id)
            .cloned()
            .collect())
    }

    fn append_analysis(
        &self,
        document_id: &DocumentId,
        analysis: AnalysisResult,
    ) -> Result<(), RepositoryError> {
        let mut inner = self.lock();
        match inner.documents.get_mut(document_id) {
            Some(document) => {
                document.analyses.push(analysis);
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn record_registry_results(
        &self,
        institution_id: &InstitutionId,
        results: Vec<RegistryVerificationResult>,
    ) -> Result<(), RepositoryError> {
        let mut inner = self.lock();
        if !inner.institutions.contains_key(institution_id) {
            return Err(RepositoryError::NotFound);
        }
        inner
            .registry_checks
            .entry(institution_id.clone())
            .or_default()
            .extend(results);
        Ok(())
    }

    fn registry_history(
        &self,
        institution_id: &InstitutionId,
    ) -> Result<Vec<RegistryVerificationResult>, RepositoryError> {
        Ok(self
            .lock()
            .registry_checks
            .get(institution_id)
            .cloned()
            .unwrap_or_default())
    }

    fn commit_decision(
        &self,
        institution: Institution,
        decision: EligibilityDecision,
        audit: AuditEntry,
    ) -> Result<EligibilityDecision, RepositoryError> {
        let mut inner = self.lock();
        if !inner.institutions.contains_key(&institution.id) {
            return Err(RepositoryError::NotFound);
        }
        inner
            .institutions
            .insert(institution.id.clone(), institution);
        inner.decisions.push(decision.clone());
        inner.append_audit(audit);
        Ok(decision)
    }

    fn decisions(
        &self,
        filter: &DecisionFilter,
    ) -> Result<Vec<EligibilityDecision>, RepositoryError> {
        Ok(self
            .lock()
            .decisions
            .iter()
            .filter(|decision| {
                filter
                    .institution_id
                    .as_ref()
                    .map_or(true, |id| decision.institution_id == *id)
                    && filter
                        .status
                        .map_or(true, |status| decision.status == status)
                    && filter.from.map_or(true, |from| decision.decided_at >= from)
                    && filter.to.map_or(true, |to| decision.decided_at <= to)
            })
            .cloned()
            .collect())
    }
}

impl AppealRepository for InMemoryVerificationStore {
    fn create_appeal(&self, appeal: Appeal, audit: AuditEntry) -> Result<Appeal, RepositoryError> {
        let mut inner = self.lock();
        let open: Vec<&Appeal> = inner
            .appeals
            .values()
            .filter(|existing| {
                existing.institution_id == appeal.institution_id
                    && !existing.state.is_terminal()
            })
            .collect();
        if open.len() > 1 {
            return Err(RepositoryError::Integrity(format!(
                "{} open appeals found for institution {}",
                open.len(),
                appeal.institution_id.0
            )));
        }
        if !open.is_empty() {
            return Err(RepositoryError::OpenAppealExists);
        }
        if inner.appeals.contains_key(&appeal.id) {
            return Err(RepositoryError::Conflict);
        }
        inner.appeals.insert(appeal.id.clone(), appeal.clone());
        inner.append_audit(audit);
        Ok(appeal)
    }

    fn fetch_appeal(&self, id: &AppealId) -> Result<Option<Appeal>, RepositoryError> {
        Ok(self.lock().appeals.get(id).cloned())
    }

    fn update_appeal(&self, appeal: Appeal, audit: AuditEntry) -> Result<(), RepositoryError> {
        let mut inner = self.lock();
        if !inner.appeals.contains_key(&appeal.id) {
            return Err(RepositoryError::NotFound);
        }
        inner.appeals.insert(appeal.id.clone(), appeal);
        inner.append_audit(audit);
        Ok(())
    }

    fn open_appeal_for(
        &self,
        institution_id: &InstitutionId,
    ) -> Result<Option<Appeal>, RepositoryError> {
        let inner = self.lock();
        let mut open = inner
            .appeals
            .values()
            .filter(|appeal| appeal.institution_id == *institution_id && !appeal.state.is_terminal());
        let first = open.next().cloned();
        if open.next().is_some() {
            return Err(RepositoryError::Integrity(format!(
                "multiple open appeals found for institution {}",
                institution_id.0
            )));
        }
        Ok(first)
    }

    fn appeals(&self, filter: &AppealFilter) -> Result<Vec<Appeal>, RepositoryError> {
        Ok(self
            .lock()
            .appeals
            .values()
            .filter(|appeal| {
                filter
                    .institution_id
                    .as_ref()
                    .map_or(true, |id| appeal.institution_id == *id)
                    && filter.state.map_or(true, |state| appeal.state == state)
                    && filter.from.map_or(true, |from| appeal.submitted_at >= from)
                    && filter.to.map_or(true, |to| appeal.submitted_at <= to)
            })
            .cloned()
            .collect())
    }
}

impl AuditLog for InMemoryVerificationStore {
    fn append(&self, entry: AuditEntry) -> Result<AuditRecord, AuditError> {
        Ok(self.lock().append_audit(entry))
    }

    fn by_institution(&self, id: &InstitutionId) -> Result<Vec<AuditRecord>, AuditError> {
        Ok(self
            .lock()
            .audit
            .iter()
            .filter(|record| record.institution_id == *id)
            .cloned()
            .collect())
    }

    fn query(&self, filter: &AuditQuery) -> Result<Vec<AuditRecord>, AuditError> {
        Ok(self
            .lock()
            .audit
            .iter()
            .filter(|record| {
                filter
                    .institution_id
                    .as_ref()
                    .map_or(true, |id| record.institution_id == *id)
                    && filter
                        .action
                        .map_or(true, |action| record.action == action)
                    && filter.from.map_or(true, |from| record.recorded_at >= from)
                    && filter.to.map_or(true, |to| record.recorded_at <= to)
            })
            .cloned()
            .collect())
    }
}
