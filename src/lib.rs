// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # Alby - Load Balancer Ingress Controller for Kubernetes
//!
//! Alby is a Kubernetes controller written in Rust that translates
//! declarative Ingress resources into a managed fleet of cloud application
//! load balancers and their subordinate resources: listeners, routing
//! rules, target groups, target registrations, security groups, and
//! optional web-application-firewall associations.
//!
//! ## Overview
//!
//! Ingresses are reconciled in **groups**: all members of a group share
//! one load balancer. Each reconcile builds a purely-declarative desired
//! [`model::Stack`], assembles the current cloud topology by tag
//! discovery, diffs the two into an ordered action plan, and deploys the
//! plan with dependency-ordered resource classes and partial-failure
//! recovery.
//!
//! ## Modules
//!
//! - [`annotations`] - typed decoding of Ingress annotations
//! - [`aws`] - cloud client facade with retry, pagination, and metrics
//! - [`model`] - the desired-state stack and its builder
//! - [`assembler`] - tag-scoped discovery of the current topology
//! - [`diff`] - semantic diffing into create/modify/replace/delete plans
//! - [`deploy`] - dependency-ordered plan execution
//! - [`ingress`] - group membership, finalizers, and status publication
//! - [`controller`] - the work queue, watches, and reconcile loop
//!
//! ## Example
//!
//! ```yaml
//! apiVersion: networking.k8s.io/v1
//! kind: Ingress
//! metadata:
//!   name: echo
//!   annotations:
//!     alby.firestoned.io/scheme: internet-facing
//!     alby.firestoned.io/subnets: subnet-a,subnet-b
//! spec:
//!   ingressClassName: alb
//!   rules:
//!     - host: echo.example.com
//!       http:
//!         paths:
//!           - path: /
//!             pathType: Prefix
//!             backend:
//!               service:
//!                 name: echo
//!                 port:
//!                   number: 80
//! ```

pub mod annotations;
pub mod assembler;
pub mod aws;
pub mod config;
pub mod constants;
pub mod context;
pub mod controller;
pub mod deploy;
pub mod diff;
pub mod errors;
pub mod events;
pub mod ingress;
pub mod labels;
pub mod metrics;
pub mod model;
pub mod resolvers;
