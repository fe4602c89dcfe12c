use crate::models::{
    Appointment, AppointmentDraft, Child, ChildDraft, Doctor, DoctorDraft, Stimulus,
    StimulusDraft,
};

use super::{listing::Searchable, Resource};

impl Resource for Child {
    type Draft = ChildDraft;
    const COLLECTION: &'static str = "children";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Resource for Doctor {
    type Draft = DoctorDraft;
    const COLLECTION: &'static str = "doctors";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Resource for Stimulus {
    type Draft = StimulusDraft;
    const COLLECTION: &'static str = "stimuli";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Resource for Appointment {
    type Draft = AppointmentDraft;
    const COLLECTION: &'static str = "appointments";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Searchable for Child {
    fn search_text(&self) -> String {
        self.name.clone()
    }
}

impl Searchable for Doctor {
    fn search_text(&self) -> String {
        match &self.specialization {
            Some(specialization) => format!("{} {}", self.name, specialization),
            None => self.name.clone(),
        }
    }
}

impl Searchable for Stimulus {
    fn search_text(&self) -> String {
        match &self.description {
            Some(description) => format!("{} {}", self.title, description),
            None => self.title.clone(),
        }
    }
}

impl Searchable for Appointment {
    fn search_text(&self) -> String {
        let notes = self.notes.as_deref().unwrap_or_default();
        format!("{} {}", self.scheduled_at, notes)
    }
}
