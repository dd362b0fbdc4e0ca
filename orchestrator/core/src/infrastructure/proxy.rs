// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Remote Management Proxy
//!
//! Dispatches calls made against a declared capability interface onto a remote managed object.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Maps interface methods to attribute reads or operation invocations
//!
//! The dispatch table is built once from the interface description:
//! a method named `get<Name>` reads attribute `<Name>`, anything else invokes
//! an operation of the same name with the declared parameter types as its
//! signature.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

use crate::domain::errors::ProxyInvocationError;
use crate::domain::management::{ManagementConnection, ObjectName};

/// Method-name prefix that marks an attribute read
pub const ATTRIBUTE_PREFIX: &str = "get";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    pub name: String,
    /// Declared parameter type names, in order
    pub param_types: Vec<String>,
}

/// Named list of methods a managed object is expected to support.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityInterface {
    pub name: String,
    pub methods: Vec<MethodSignature>,
}

impl CapabilityInterface {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), methods: Vec::new() }
    }

    pub fn method(mut self, name: impl Into<String>, param_types: &[&str]) -> Self {
        self.methods.push(MethodSignature {
            name: name.into(),
            param_types: param_types.iter().map(|t| t.to_string()).collect(),
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    GetAttribute { attribute: String },
    Invoke { operation: String, signature: Vec<String> },
}

impl Dispatch {
    pub fn for_method(method: &MethodSignature) -> Self {
        match method.name.strip_prefix(ATTRIBUTE_PREFIX) {
            Some(attribute) if !attribute.is_empty() => Dispatch::GetAttribute {
                attribute: attribute.to_string(),
            },
            _ => Dispatch::Invoke {
                operation: method.name.clone(),
                signature: method.param_types.clone(),
            },
        }
    }
}

/// Typed-by-description handle on one remote managed object.
pub struct ManagedObjectProxy {
    connection: Arc<dyn ManagementConnection>,
    object: ObjectName,
    interface: String,
    dispatch: HashMap<String, Dispatch>,
}

impl ManagedObjectProxy {
    pub fn new(
        connection: Arc<dyn ManagementConnection>,
        object: ObjectName,
        interface: &CapabilityInterface,
    ) -> Self {
        let dispatch = interface
            .methods
            .iter()
            .map(|method| (method.name.clone(), Dispatch::for_method(method)))
            .collect();

        Self {
            connection,
            object,
            interface: interface.name.clone(),
            dispatch,
        }
    }

    pub fn object(&self) -> &ObjectName {
        &self.object
    }

    pub fn dispatch_for(&self, method: &str) -> Option<&Dispatch> {
        self.dispatch.get(method)
    }

    /// Call `method` with `args`; attribute reads ignore their arguments
    pub async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value, ProxyInvocationError> {
        let dispatch = self.dispatch.get(method).ok_or_else(|| ProxyInvocationError::UnknownMethod {
            object: self.object.to_string(),
            interface: self.interface.clone(),
            method: method.to_string(),
        })?;

        let result = match dispatch {
            Dispatch::GetAttribute { attribute } => {
                trace!(object = %self.object, attribute = %attribute, "Reading attribute");
                self.connection.get_attribute(&self.object, attribute).await
            }
            Dispatch::Invoke { operation, signature } => {
                if args.len() != signature.len() {
                    return Err(ProxyInvocationError::Arity {
                        method: method.to_string(),
                        expected: signature.len(),
                        actual: args.len(),
                    });
                }
                trace!(object = %self.object, operation = %operation, "Invoking operation");
                self.connection
                    .invoke(&self.object, operation, args, signature.clone())
                    .await
            }
        };

        result.map_err(|source| ProxyInvocationError::Remote {
            object: self.object.to_string(),
            method: method.to_string(),
            source,
        })
    }

    /// Call `method` and coerce the result into the caller's declared type
    pub async fn call_as<T: DeserializeOwned>(
        &self,
        method: &str,
        args: Vec<Value>,
    ) -> Result<T, ProxyInvocationError> {
        let value = self.call(method, args).await?;
        serde_json::from_value(value).map_err(|e| ProxyInvocationError::Coercion {
            method: method.to_string(),
            reason: e.to_string(),
        })
    }
}
