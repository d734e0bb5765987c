use std::collections::HashMap;

use crate::api::characteristic::{CharacteristicHandle, CharacteristicRole};
use crate::api::service::Service;
use crate::{Error, ErrorType, Result};

/// Role to handle mapping produced once at registration, immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacteristicTable {
    pub device_name: CharacteristicHandle,
    pub rx: CharacteristicHandle,
    pub tx: CharacteristicHandle,
}

impl CharacteristicTable {
    /// Pair the declared characteristics with the handles the stack returned.
    /// The stack hands back one handle per characteristic, in declaration
    /// order across all services.
    pub fn from_registration(
        services: &[Service],
        handles: &[CharacteristicHandle],
    ) -> Result<Self> {
        let declared = services
            .iter()
            .flat_map(|service| service.characteristics.iter());

        let declared_count = services
            .iter()
            .map(|service| service.characteristics.len())
            .sum::<usize>();
        if declared_count != handles.len() {
            return Err(Error::from_string(
                format!(
                    "Declared {declared_count} characteristics but the stack returned {} handles",
                    handles.len()
                ),
                ErrorType::Registration,
            ));
        }

        let mut roles: HashMap<CharacteristicRole, CharacteristicHandle> = HashMap::new();
        for (characteristic, handle) in declared.zip(handles.iter().copied()) {
            for role in &characteristic.roles {
                if roles.insert(*role, handle).is_some() {
                    return Err(Error::from_string(
                        format!("Role {role:?} declared more than once"),
                        ErrorType::Registration,
                    ));
                }
            }
        }

        let take = |role: CharacteristicRole| {
            roles.get(&role).copied().ok_or_else(|| {
                Error::from_string(
                    format!("No characteristic declared for role {role:?}"),
                    ErrorType::Registration,
                )
            })
        };

        Ok(CharacteristicTable {
            device_name: take(CharacteristicRole::DeviceName)?,
            rx: take(CharacteristicRole::Rx)?,
            tx: take(CharacteristicRole::Tx)?,
        })
    }
}
