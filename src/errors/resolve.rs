use std::fmt::Write as _;

use super::instantiate::InstantiateErrorKind;
use crate::any::TypeInfo;

#[derive(thiserror::Error, Debug)]
pub enum ResolveErrorKind {
    #[error("Service {service} is not registered")]
    NotRegistered { service: TypeInfo },
    #[error("Cyclic dependency detected: {}", format_trail(.trail, .service))]
    CircularDependency { service: TypeInfo, trail: Box<[TypeInfo]> },
    #[error("Unable to resolve parameter `{parameter}` of {service}: no override, no registered service and no default")]
    Unresolvable { parameter: &'static str, service: TypeInfo },
    #[error("Incorrect instance type. Actual: {actual}, expected: {expected}")]
    IncorrectType { expected: TypeInfo, actual: TypeInfo },
    #[error("Parameter `{parameter}` of {service} expects {expected}, but another type was supplied")]
    IncorrectArgumentType {
        parameter: &'static str,
        service: TypeInfo,
        expected: TypeInfo,
    },
    #[error("Scoped service {service} requested without an active scope")]
    NoActiveScope { service: TypeInfo },
    #[error("Scoped service {service} requested from an exited scope")]
    ScopeExited { service: TypeInfo },
    #[error("Container of {service} is dropped")]
    ContainerDropped { service: TypeInfo },
    #[error("Instantiator of {service} failed: {source}")]
    Instantiate {
        service: TypeInfo,
        #[source]
        source: InstantiateErrorKind,
    },
}

fn format_trail(trail: &[TypeInfo], service: &TypeInfo) -> String {
    let mut out = String::new();
    for type_info in trail {
        let _ = write!(out, "{type_info} -> ");
    }
    let _ = write!(out, "{service}");
    out
}
