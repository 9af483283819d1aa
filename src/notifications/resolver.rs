use crate::config::{Channel, RecipientKind};
use crate::entities::contact;
use crate::error::Result;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use uuid::Uuid;

/// Load a tenant's active contacts once per dispatch; resolution itself is
/// pure over the loaded slice.
pub async fn load_active_contacts(
    db: &DatabaseConnection,
    tenant_id: Uuid,
) -> Result<Vec<contact::Model>> {
    let contacts = contact::Entity::find()
        .filter(contact::Column::TenantId.eq(tenant_id))
        .filter(contact::Column::IsActive.eq(true))
        .all(db)
        .await?;
    Ok(contacts)
}

/// Resolve a recipient-type token to the single contact that should be
/// addressed for a normal dispatch. Lower `priority` wins, defaults break
/// ties; operators associated with the signal's vehicle or driver outrank
/// unassociated ones.
pub fn resolve_recipient<'a>(
    kind: RecipientKind,
    contacts: &'a [contact::Model],
    vehicle_id: &str,
    driver_id: Option<&str>,
) -> Option<&'a contact::Model> {
    let mut candidates: Vec<&contact::Model> = contacts
        .iter()
        .filter(|c| c.is_active && c.contact_type == kind.as_str())
        .collect();

    if kind == RecipientKind::Operator {
        let associated: Vec<&contact::Model> = candidates
            .iter()
            .copied()
            .filter(|c| {
                c.vehicle_id.as_deref() == Some(vehicle_id)
                    || (driver_id.is_some() && c.driver_id.as_deref() == driver_id)
            })
            .collect();
        if !associated.is_empty() {
            candidates = associated;
        }
    }

    candidates.sort_by_key(|c| (!c.is_default, c.priority, c.id));
    candidates.first().copied()
}

/// Every active contact of a type, for the panic fan-out.
pub fn all_active_of<'a>(
    kind: RecipientKind,
    contacts: &'a [contact::Model],
) -> Vec<&'a contact::Model> {
    let mut matched: Vec<&contact::Model> = contacts
        .iter()
        .filter(|c| c.is_active && c.contact_type == kind.as_str())
        .collect();
    matched.sort_by_key(|c| (!c.is_default, c.priority, c.id));
    matched
}

/// The endpoint a channel addresses on a contact, if the contact has one.
pub fn endpoint_for(channel: Channel, contact: &contact::Model) -> Option<String> {
    match channel {
        Channel::Sms | Channel::Voice => contact.phone.clone(),
        Channel::Whatsapp => contact.whatsapp.clone().or_else(|| contact.phone.clone()),
        Channel::Email => contact.email.clone(),
    }
    .filter(|endpoint| !endpoint.is_empty())
}

#[cfg(test)]
pub(crate) fn test_contact(
    id: i32,
    contact_type: &str,
    phone: Option<&str>,
) -> contact::Model {
    let now = chrono::Utc::now().naive_utc();
    contact::Model {
        id,
        tenant_id: Uuid::nil(),
        contact_type: contact_type.to_string(),
        name: format!("contact-{id}"),
        phone: phone.map(str::to_string),
        whatsapp: None,
        email: None,
        priority: 0,
        is_default: false,
        is_active: true,
        vehicle_id: None,
        driver_id: None,
        notes: None,
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_and_foreign_types_are_ignored() {
        let mut inactive = test_contact(1, "supervisor", Some("+100"));
        inactive.is_active = false;
        let operator = test_contact(2, "operator", Some("+200"));
        let supervisor = test_contact(3, "supervisor", Some("+300"));
        let contacts = vec![inactive, operator, supervisor];

        let resolved =
            resolve_recipient(RecipientKind::Supervisor, &contacts, "veh-1", None).unwrap();
        assert_eq!(resolved.id, 3);
    }

    #[test]
    fn priority_and_default_ordering() {
        let mut low = test_contact(1, "monitoring_team", Some("+100"));
        low.priority = 5;
        let mut high = test_contact(2, "monitoring_team", Some("+200"));
        high.priority = 1;
        let mut fallback_default = test_contact(3, "monitoring_team", Some("+300"));
        fallback_default.priority = 9;
        fallback_default.is_default = true;

        let contacts = vec![low, high, fallback_default];
        let resolved =
            resolve_recipient(RecipientKind::MonitoringTeam, &contacts, "veh-1", None).unwrap();
        // the explicit default wins before priority ordering applies
        assert_eq!(resolved.id, 3);
    }

    #[test]
    fn operator_association_outranks_default() {
        let mut unassociated = test_contact(1, "operator", Some("+100"));
        unassociated.is_default = true;
        let mut vehicle_bound = test_contact(2, "operator", Some("+200"));
        vehicle_bound.vehicle_id = Some("veh-7".to_string());
        let mut driver_bound = test_contact(3, "operator", Some("+300"));
        driver_bound.driver_id = Some("drv-9".to_string());

        let contacts = vec![unassociated, vehicle_bound, driver_bound];

        let by_vehicle =
            resolve_recipient(RecipientKind::Operator, &contacts, "veh-7", None).unwrap();
        assert_eq!(by_vehicle.id, 2);

        let by_driver =
            resolve_recipient(RecipientKind::Operator, &contacts, "veh-0", Some("drv-9")).unwrap();
        assert_eq!(by_driver.id, 3);

        let neither =
            resolve_recipient(RecipientKind::Operator, &contacts, "veh-0", None).unwrap();
        assert_eq!(neither.id, 1);
    }

    #[test]
    fn endpoint_selection_per_channel() {
        let mut contact = test_contact(1, "supervisor", Some("+100"));
        contact.whatsapp = Some("+199".to_string());
        contact.email = Some("sup@example.com".to_string());

        assert_eq!(endpoint_for(Channel::Sms, &contact).unwrap(), "+100");
        assert_eq!(endpoint_for(Channel::Whatsapp, &contact).unwrap(), "+199");
        assert_eq!(endpoint_for(Channel::Voice, &contact).unwrap(), "+100");
        assert_eq!(
            endpoint_for(Channel::Email, &contact).unwrap(),
            "sup@example.com"
        );

        let bare = test_contact(2, "supervisor", None);
        assert!(endpoint_for(Channel::Sms, &bare).is_none());
        assert!(endpoint_for(Channel::Whatsapp, &bare).is_none());
    }
}
