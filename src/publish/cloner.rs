//! Graph cloner
//!
//! Per-kind routines that copy draft rows into the live store, swapping in the
//! live parent identifiers. Each routine fetches its draft rows in sequencing
//! order and writes parents before children.

use super::remap::{IdRemap, Resolved};
use super::types::CloneCounts;
use crate::db::repository::{PublishUnitOfWork, StoreResult};
use crate::models::*;
use tracing::{debug, warn};
use uuid::Uuid;

/// A draft module together with its ordered lessons
pub type ModulePlan = (ModuleRow, Vec<LessonRow>);

pub struct GraphCloner<'a> {
    uow: &'a mut dyn PublishUnitOfWork,
    draft_course_id: Uuid,
    live_course_id: Uuid,
    counts: CloneCounts,
}

impl<'a> GraphCloner<'a> {
    pub fn new(uow: &'a mut dyn PublishUnitOfWork, draft_course_id: Uuid, live_course_id: Uuid) -> Self {
        Self {
            uow,
            draft_course_id,
            live_course_id,
            counts: CloneCounts::default(),
        }
    }

    pub fn counts(&self) -> CloneCounts {
        self.counts
    }

    /// Modules first, then every lesson (and its notes) under the new modules
    pub async fn clone_modules(&mut self, plan: &[ModulePlan], remap: &mut IdRemap) -> StoreResult<()> {
        for (module, _) in plan {
            let live = live_module(module, self.live_course_id);
            self.uow.insert_live_module(&live).await?;
            remap.record_module(module.id, live.id);
            self.counts.modules += 1;
        }
        debug!("Cloned {} modules", self.counts.modules);

        for (module, lessons) in plan {
            let Some(live_module_id) = remap.module(module.id) else {
                continue;
            };
            for lesson in lessons {
                let live = live_lesson(lesson, live_module_id);
                self.uow.insert_live_lesson(&live).await?;
                remap.record_lesson(lesson.id, live.id);
                self.counts.lessons += 1;

                for note in self.uow.draft_notes(lesson.id).await? {
                    self.uow.insert_live_note(&live_note(&note, live.id)).await?;
                    self.counts.notes += 1;
                }
            }
        }
        debug!("Cloned {} lessons, {} notes", self.counts.lessons, self.counts.notes);
        Ok(())
    }

    pub async fn clone_tests(&mut self, remap: &IdRemap) -> StoreResult<()> {
        for test in self.uow.draft_tests(self.draft_course_id).await? {
            let module_id = self.resolve("test", test.id, "module", remap.resolve_module(test.module_id));
            let live = live_test(&test, self.live_course_id, module_id);
            self.uow.insert_live_test(&live).await?;
            self.counts.tests += 1;

            for question in self.uow.draft_questions(test.id).await? {
                self.uow.insert_live_question(&live_question(&question, live.id)).await?;
                self.counts.questions += 1;
            }
        }
        debug!("Cloned {} tests, {} questions", self.counts.tests, self.counts.questions);
        Ok(())
    }

    pub async fn clone_projects(&mut self, remap: &IdRemap) -> StoreResult<()> {
        for project in self.uow.draft_projects(self.draft_course_id).await? {
            let module_id =
                self.resolve("project", project.id, "module", remap.resolve_module(project.module_id));
            let live = live_project(&project, self.live_course_id, module_id);
            self.uow.insert_live_project(&live).await?;
            self.counts.projects += 1;

            for step in self.uow.draft_project_steps(project.id).await? {
                self.uow.insert_live_project_step(&live_step(&step, live.id)).await?;
                self.counts.steps += 1;
            }
        }
        debug!("Cloned {} projects, {} steps", self.counts.projects, self.counts.steps);
        Ok(())
    }

    pub async fn clone_labs(&mut self, remap: &IdRemap) -> StoreResult<()> {
        for lab in self.uow.draft_labs(self.draft_course_id).await? {
            let module_id = self.resolve("lab", lab.id, "module", remap.resolve_module(lab.module_id));
            let lesson_id = self.resolve("lab", lab.id, "lesson", remap.resolve_lesson(lab.lesson_id));
            self.uow
                .insert_live_lab(&live_lab(&lab, self.live_course_id, module_id, lesson_id))
                .await?;
            self.counts.labs += 1;
        }
        debug!("Cloned {} labs", self.counts.labs);
        Ok(())
    }

    /// Certificates, reward configuration and both card collections
    pub async fn clone_course_scoped(&mut self) -> StoreResult<()> {
        let course_id = self.live_course_id;

        for certificate in self.uow.draft_certificates(self.draft_course_id).await? {
            self.uow
                .insert_live_certificate(&live_certificate(&certificate, course_id))
                .await?;
            self.counts.certificates += 1;
        }

        for reward in self.uow.draft_rewards(self.draft_course_id).await? {
            self.uow.insert_live_reward(&live_reward(&reward, course_id)).await?;
            self.counts.rewards += 1;
        }

        for kind in [CardKind::Achievement, CardKind::Motivational] {
            for card in self.uow.draft_cards(self.draft_course_id, kind).await? {
                self.uow.insert_live_card(kind, &live_card(&card, course_id)).await?;
                match kind {
                    CardKind::Achievement => self.counts.achievement_cards += 1,
                    CardKind::Motivational => self.counts.motivational_cards += 1,
                }
            }
        }

        debug!(
            "Cloned {} certificates, {} rewards, {} achievement cards, {} motivational cards",
            self.counts.certificates,
            self.counts.rewards,
            self.counts.achievement_cards,
            self.counts.motivational_cards
        );
        Ok(())
    }

    /// Dangling draft references are dropped rather than carried into live
    fn resolve(&self, entity: &str, entity_id: Uuid, target: &str, resolved: Resolved) -> Option<Uuid> {
        if let Resolved::Dangling(draft_id) = resolved {
            warn!(
                "Draft {} {} references {} {} outside course {}; cloning without it",
                entity, entity_id, target, draft_id, self.draft_course_id
            );
        }
        resolved.live_id()
    }
}

// =============================================================================
// ROW CLONES
// =============================================================================
//
// Each clone mints a fresh id, points at the given live parent(s) and records
// the draft row id as `source_id`. Draft `created_at` is kept so live reads
// order the same way draft reads do.

fn live_module(draft: &ModuleRow, course_id: Uuid) -> ModuleRow {
    ModuleRow {
        id: Uuid::new_v4(),
        course_id,
        source_id: Some(draft.id),
        ..draft.clone()
    }
}

fn live_lesson(draft: &LessonRow, module_id: Uuid) -> LessonRow {
    LessonRow {
        id: Uuid::new_v4(),
        module_id,
        source_id: Some(draft.id),
        ..draft.clone()
    }
}

fn live_note(draft: &AiNoteRow, lesson_id: Uuid) -> AiNoteRow {
    AiNoteRow {
        id: Uuid::new_v4(),
        lesson_id,
        source_id: Some(draft.id),
        ..draft.clone()
    }
}

fn live_test(draft: &TestRow, course_id: Uuid, module_id: Option<Uuid>) -> TestRow {
    TestRow {
        id: Uuid::new_v4(),
        course_id,
        module_id,
        source_id: Some(draft.id),
        ..draft.clone()
    }
}

fn live_question(draft: &QuestionRow, test_id: Uuid) -> QuestionRow {
    QuestionRow {
        id: Uuid::new_v4(),
        test_id,
        source_id: Some(draft.id),
        ..draft.clone()
    }
}

fn live_project(draft: &ProjectRow, course_id: Uuid, module_id: Option<Uuid>) -> ProjectRow {
    ProjectRow {
        id: Uuid::new_v4(),
        course_id,
        module_id,
        source_id: Some(draft.id),
        ..draft.clone()
    }
}

fn live_step(draft: &ProjectStepRow, project_id: Uuid) -> ProjectStepRow {
    ProjectStepRow {
        id: Uuid::new_v4(),
        project_id,
        source_id: Some(draft.id),
        ..draft.clone()
    }
}

fn live_lab(draft: &LabRow, course_id: Uuid, module_id: Option<Uuid>, lesson_id: Option<Uuid>) -> LabRow {
    LabRow {
        id: Uuid::new_v4(),
        course_id,
        module_id,
        lesson_id,
        source_id: Some(draft.id),
        ..draft.clone()
    }
}

fn live_certificate(draft: &CertificateRow, course_id: Uuid) -> CertificateRow {
    CertificateRow {
        id: Uuid::new_v4(),
        course_id,
        source_id: Some(draft.id),
        ..draft.clone()
    }
}

fn live_reward(draft: &CourseRewardRow, course_id: Uuid) -> CourseRewardRow {
    CourseRewardRow {
        id: Uuid::new_v4(),
        course_id,
        source_id: Some(draft.id),
        ..draft.clone()
    }
}

fn live_card(draft: &CardRow, course_id: Uuid) -> CardRow {
    CardRow {
        id: Uuid::new_v4(),
        course_id,
        source_id: Some(draft.id),
        ..draft.clone()
    }
}
