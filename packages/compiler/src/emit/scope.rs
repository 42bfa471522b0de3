//! Scope-aware resource id construction.
//!
//! The id function family a resource id goes through depends on the
//! deployment scope its declaration targets. These helpers are pure: callers
//! resolve any scope-resource expression first and pass it in.

use crate::emit::{EmitError, Result};
use crate::semantics::metadata::ScopeData;
use crate::template::expression::{append_properties, create_function, TemplateExpression};

pub const MANAGEMENT_GROUP_TYPE: &str = "Microsoft.Management/managementGroups";

/// `resourceId('My.Rp/type', seg...)` — the current resource group.
pub fn resource_group_resource_id(
    fully_qualified_type: &str,
    name_segments: Vec<TemplateExpression>,
) -> TemplateExpression {
    create_function("resourceId", with_type(fully_qualified_type, name_segments))
}

/// `subscriptionResourceId('My.Rp/type', seg...)`.
pub fn subscription_resource_id(
    fully_qualified_type: &str,
    name_segments: Vec<TemplateExpression>,
) -> TemplateExpression {
    create_function(
        "subscriptionResourceId",
        with_type(fully_qualified_type, name_segments),
    )
}

/// `tenantResourceId('My.Rp/type', seg...)` — also used at management group
/// scope, where ids are tenant-rooted.
pub fn tenant_resource_id(
    fully_qualified_type: &str,
    name_segments: Vec<TemplateExpression>,
) -> TemplateExpression {
    create_function(
        "tenantResourceId",
        with_type(fully_qualified_type, name_segments),
    )
}

/// `extensionResourceId(<scope>, 'My.Rp/type', seg...)`.
pub fn extension_resource_id(
    scope: TemplateExpression,
    fully_qualified_type: &str,
    name_segments: Vec<TemplateExpression>,
) -> TemplateExpression {
    let mut parameters = vec![scope, TemplateExpression::string(fully_qualified_type)];
    parameters.extend(name_segments);
    create_function("extensionResourceId", parameters)
}

/// Unqualified id for same-deployment references:
/// `format('My.Rp/type1/{0}/type2/{1}', seg...)`.
pub fn unqualified_resource_id(
    fully_qualified_type: &str,
    name_segments: Vec<TemplateExpression>,
) -> TemplateExpression {
    let mut segments = fully_qualified_type.split('/');
    // First segment is the provider namespace and gets no placeholder.
    let mut format_string = segments.next().unwrap_or_default().to_string();
    for (i, type_segment) in segments.enumerate() {
        format_string.push('/');
        format_string.push_str(type_segment);
        format_string.push_str(&format!("/{{{i}}}"));
    }

    let mut parameters = vec![TemplateExpression::string(format_string)];
    parameters.extend(name_segments);
    create_function("format", parameters)
}

/// Management group ids come in a tenant-qualified and a name-only flavor.
pub fn management_group_resource_id(
    name: TemplateExpression,
    fully_qualified: bool,
) -> TemplateExpression {
    match fully_qualified {
        true => tenant_resource_id(MANAGEMENT_GROUP_TYPE, vec![name]),
        false => unqualified_resource_id(MANAGEMENT_GROUP_TYPE, vec![name]),
    }
}

/// `managementGroup().id` — the ambient management group of the deployment.
pub fn current_management_group_id() -> TemplateExpression {
    match create_function("managementGroup", Vec::new()) {
        TemplateExpression::Function(function) => {
            append_properties(function, vec![TemplateExpression::string("id")])
        }
        TemplateExpression::Literal(_) => unreachable!("create_function returns a function"),
    }
}

/// `format('/subscriptions/{0}/resourceGroups/{1}', sub, rg)` — a resource
/// group id usable as an extension scope.
pub fn resource_group_scope(
    subscription_id: TemplateExpression,
    resource_group: TemplateExpression,
) -> TemplateExpression {
    create_function(
        "format",
        vec![
            TemplateExpression::string("/subscriptions/{0}/resourceGroups/{1}"),
            subscription_id,
            resource_group,
        ],
    )
}

/// Dispatches to the id function matching the declaration's scope. For
/// extension scopes the caller resolves the scope resource's id up front and
/// passes it as `extension_scope`.
pub fn format_fully_qualified_resource_id(
    scope: &ScopeData,
    extension_scope: Option<TemplateExpression>,
    fully_qualified_type: &str,
    name_segments: Vec<TemplateExpression>,
) -> Result<TemplateExpression> {
    match scope {
        ScopeData::ResourceGroup => Ok(resource_group_resource_id(
            fully_qualified_type,
            name_segments,
        )),
        ScopeData::Subscription => Ok(subscription_resource_id(
            fully_qualified_type,
            name_segments,
        )),
        ScopeData::ManagementGroup | ScopeData::Tenant => {
            Ok(tenant_resource_id(fully_qualified_type, name_segments))
        }
        ScopeData::Extension { .. } => match extension_scope {
            Some(scope) => Ok(extension_resource_id(
                scope,
                fully_qualified_type,
                name_segments,
            )),
            None => Err(EmitError::unsupported(
                "extension scope without a resolved scope expression",
            )),
        },
    }
}

fn with_type(
    fully_qualified_type: &str,
    name_segments: Vec<TemplateExpression>,
) -> Vec<TemplateExpression> {
    let mut parameters = vec![TemplateExpression::string(fully_qualified_type)];
    parameters.extend(name_segments);
    parameters
}
