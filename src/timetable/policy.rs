use super::setup::TimetableSetup;
use super::TimetableError;

/// Identity and role as supplied by the authenticating collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: String,
    pub role: String,
}

pub fn ensure_can_edit_slots(setup: &TimetableSetup, caller: &Caller) -> Result<(), TimetableError> {
    if setup.allows_role(&caller.role) {
        return Ok(());
    }
    tracing::warn!(caller = %caller.id, role = %caller.role, "slot edit refused");
    Err(TimetableError::Forbidden {
        role: caller.role.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_editor_roles_pass() {
        let setup = TimetableSetup::default();
        let admin = Caller {
            id: "u1".into(),
            role: "Admin".into(),
        };
        let faculty = Caller {
            id: "u2".into(),
            role: "faculty".into(),
        };
        assert!(ensure_can_edit_slots(&setup, &admin).is_ok());
        assert!(matches!(
            ensure_can_edit_slots(&setup, &faculty),
            Err(TimetableError::Forbidden { .. })
        ));
    }
}
