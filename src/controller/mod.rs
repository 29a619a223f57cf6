// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The controller loop.
//!
//! Watch streams on Ingresses, Services, Endpoints, and Nodes feed the
//! [`GroupQueue`] through the group loader's reverse index; a fixed pool
//! of workers drains it, one group at a time per worker, each reconcile
//! bounded by the configured deadline. Failures re-enqueue with the
//! queue's bounded exponential backoff.
//!
//! One reconcile drives the full pipeline: load group, add finalizers,
//! parse annotations, resolve symbolic references, build the desired
//! stack, assemble the current topology, diff, deploy, publish outputs,
//! and release finalizers of departed members.

pub mod queue;

use crate::annotations::BadAnnotationCache;
use crate::assembler;
use crate::aws::Cloud;
use crate::config::ControllerConfig;
use crate::context::{Context, Stores};
use crate::deploy::targets::ClusterTargetResolver;
use crate::deploy::StackDeployer;
use crate::errors::ReconcileError;
use crate::events::{reasons, EventPublisher};
use crate::ingress::group::{
    self, all_groups, groups_of_ingress_event, groups_referencing_service, Group, GroupId,
};
use crate::ingress::{finalizers, status};
use crate::metrics;
use crate::model::builder::{
    build_stack, load_balancer_dns_reference, merge_lb_attributes, BuildContext, MemberConfig,
    ResolvedLbConfig,
};
use crate::model::Stack;
use crate::diff;
use crate::resolvers::ResourceResolvers;
use futures::future::join_all;
use futures::StreamExt;
use k8s_openapi::api::core::v1::{Endpoints, Node, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::runtime::events::EventType;
use kube::runtime::reflector::store::Writer;
use kube::runtime::{reflector, watcher, WatchStreamExt};
use kube::Resource as KubeResource;
use kube::{Api, Client, ResourceExt};
use queue::GroupQueue;
use std::pin::pin;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Run the controller until a watch stream terminates fatally.
///
/// # Errors
///
/// Returns an error when any watch stream ends, which the caller treats
/// as fatal for the process.
pub async fn run(
    client: Client,
    cloud: Cloud,
    config: Arc<ControllerConfig>,
    events: Arc<dyn EventPublisher>,
) -> anyhow::Result<()> {
    let (ingress_store, ingress_writer) = reflector::store::<Ingress>();
    let (service_store, service_writer) = reflector::store::<Service>();
    let (endpoints_store, endpoints_writer) = reflector::store::<Endpoints>();
    let (node_store, node_writer) = reflector::store::<Node>();

    let ctx = Arc::new(Context {
        client: client.clone(),
        stores: Stores {
            ingresses: ingress_store,
            services: service_store,
            endpoints: endpoints_store,
            nodes: node_store,
        },
        cloud,
        config: Arc::clone(&config),
        events,
        annotation_cache: Arc::new(BadAnnotationCache::default()),
    });

    let queue = GroupQueue::new(config.backoff_initial, config.backoff_cap);

    info!(
        workers = config.workers,
        class = %config.ingress_class,
        controller_id = %config.controller_id,
        "starting group reconciliation controller"
    );

    let workers = join_all(
        (0..config.workers).map(|index| worker(Arc::clone(&ctx), queue.clone(), index)),
    );

    tokio::select! {
        result = watch_ingresses(client.clone(), ingress_writer, Arc::clone(&ctx), queue.clone()) => {
            error!("CRITICAL: ingress watch exited unexpectedly: {:?}", result);
            result
        }
        result = watch_services(client.clone(), service_writer, Arc::clone(&ctx), queue.clone()) => {
            error!("CRITICAL: service watch exited unexpectedly: {:?}", result);
            result
        }
        result = watch_endpoints(client.clone(), endpoints_writer, Arc::clone(&ctx), queue.clone()) => {
            error!("CRITICAL: endpoints watch exited unexpectedly: {:?}", result);
            result
        }
        result = watch_nodes(client, node_writer, Arc::clone(&ctx), queue.clone()) => {
            error!("CRITICAL: node watch exited unexpectedly: {:?}", result);
            result
        }
        _ = workers => {
            anyhow::bail!("reconcile workers exited unexpectedly")
        }
    }
}

async fn watch_ingresses(
    client: Client,
    writer: Writer<Ingress>,
    ctx: Arc<Context>,
    queue: GroupQueue,
) -> anyhow::Result<()> {
    let api = Api::<Ingress>::all(client);
    let mut stream = pin!(watcher(api, watcher::Config::default())
        .default_backoff()
        .reflect(writer)
        .touched_objects());

    while let Some(event) = stream.next().await {
        match event {
            Ok(ingress) => {
                for group in groups_of_ingress_event(&ingress, &ctx.config) {
                    queue.enqueue(group);
                }
            }
            Err(err) => warn!(error = %err, "ingress watch error"),
        }
    }
    anyhow::bail!("ingress watch stream ended")
}

async fn watch_services(
    client: Client,
    writer: Writer<Service>,
    ctx: Arc<Context>,
    queue: GroupQueue,
) -> anyhow::Result<()> {
    let api = Api::<Service>::all(client);
    let mut stream = pin!(watcher(api, watcher::Config::default())
        .default_backoff()
        .reflect(writer)
        .touched_objects());

    while let Some(event) = stream.next().await {
        match event {
            Ok(service) => {
                enqueue_groups_for_service(
                    &ctx,
                    &queue,
                    &service.namespace().unwrap_or_default(),
                    &service.name_any(),
                );
            }
            Err(err) => warn!(error = %err, "service watch error"),
        }
    }
    anyhow::bail!("service watch stream ended")
}

async fn watch_endpoints(
    client: Client,
    writer: Writer<Endpoints>,
    ctx: Arc<Context>,
    queue: GroupQueue,
) -> anyhow::Result<()> {
    let api = Api::<Endpoints>::all(client);
    let mut stream = pin!(watcher(api, watcher::Config::default())
        .default_backoff()
        .reflect(writer)
        .touched_objects());

    while let Some(event) = stream.next().await {
        match event {
            // Endpoints share their Service's name
            Ok(endpoints) => {
                enqueue_groups_for_service(
                    &ctx,
                    &queue,
                    &endpoints.namespace().unwrap_or_default(),
                    &endpoints.name_any(),
                );
            }
            Err(err) => warn!(error = %err, "endpoints watch error"),
        }
    }
    anyhow::bail!("endpoints watch stream ended")
}

async fn watch_nodes(
    client: Client,
    writer: Writer<Node>,
    ctx: Arc<Context>,
    queue: GroupQueue,
) -> anyhow::Result<()> {
    let api = Api::<Node>::all(client);
    let mut stream = pin!(watcher(api, watcher::Config::default())
        .default_backoff()
        .reflect(writer)
        .touched_objects());

    while let Some(event) = stream.next().await {
        match event {
            Ok(_node) => {
                // Node membership affects instance-mode targets of every
                // group
                let ingresses = ctx.stores.ingresses.state();
                for group in all_groups(&ingresses, &ctx.config) {
                    queue.enqueue(group);
                }
            }
            Err(err) => warn!(error = %err, "node watch error"),
        }
    }
    anyhow::bail!("node watch stream ended")
}

fn enqueue_groups_for_service(
    ctx: &Context,
    queue: &GroupQueue,
    namespace: &str,
    name: &str,
) {
    let ingresses = ctx.stores.ingresses.state();
    for group in groups_referencing_service(&ingresses, namespace, name, &ctx.config) {
        queue.enqueue(group);
    }
}

/// One reconcile worker: drains the queue forever.
async fn worker(ctx: Arc<Context>, queue: GroupQueue, index: usize) {
    // Watch mappers need populated stores before group loads make sense
    ctx.stores.ingresses.wait_until_ready().await.ok();
    ctx.stores.services.wait_until_ready().await.ok();
    ctx.stores.endpoints.wait_until_ready().await.ok();
    ctx.stores.nodes.wait_until_ready().await.ok();
    debug!(worker = index, "reconcile worker started");

    loop {
        let group = queue.next().await;
        let started = Instant::now();

        let success = match tokio::time::timeout(
            ctx.config.reconcile_deadline,
            reconcile_group(&ctx, &group),
        )
        .await
        {
            Ok(Ok(())) => {
                info!(group = %group, elapsed = ?started.elapsed(), "successfully reconciled group");
                true
            }
            Ok(Err(err)) => {
                error!(
                    group = %group,
                    reason = err.status_reason(),
                    retryable = err.is_retryable(),
                    "failed to reconcile group: {err}"
                );
                false
            }
            Err(_elapsed) => {
                warn!(group = %group, deadline = ?ctx.config.reconcile_deadline, "reconcile deadline exceeded, re-enqueueing");
                false
            }
        };

        metrics::record_reconciliation(success, started.elapsed());
        queue.done(&group, success);
    }
}

/// Reconcile one group end to end.
///
/// # Errors
///
/// Any [`ReconcileError`]; the worker's error policy re-enqueues.
pub async fn reconcile_group(ctx: &Context, group_id: &GroupId) -> Result<(), ReconcileError> {
    let all_ingresses = ctx.stores.ingresses.state();
    let group = group::load(&all_ingresses, group_id, &ctx.config)?;

    // Finalizers first: the controller must hold every active member
    // before any cloud resource reflects its contribution
    for member in &group.members {
        finalizers::ensure_group_finalizer(&ctx.client, &member.ingress, group_id).await?;
    }

    let result = reconcile_loaded_group(ctx, &group).await;
    publish_outcome_events(ctx, &group, &result).await;
    result
}

async fn reconcile_loaded_group(ctx: &Context, group: &Group) -> Result<(), ReconcileError> {
    let mut configs = Vec::with_capacity(group.members.len());
    for member in &group.members {
        let parsed = ctx
            .annotation_cache
            .parse_cached(member.ingress.annotations(), &ctx.config.annotation_defaults)
            .map_err(|err| ReconcileError::validation(err.to_string()))?;
        configs.push(MemberConfig {
            member: member.clone(),
            annotations: parsed,
        });
    }

    let stack = if group.is_teardown() {
        info!(group = %group.id, "group has no active members, tearing down");
        Stack::new()
    } else {
        let merged = merge_lb_attributes(&configs)?;
        let mut resolvers = ResourceResolvers::new(&ctx.cloud);
        let subnet_ids = resolvers.resolve_subnets(&merged.subnet_tokens).await?;
        let security_group_ids = if merged.security_group_tokens.is_empty() {
            Vec::new()
        } else {
            resolvers
                .resolve_security_groups(&merged.security_group_tokens)
                .await?
        };
        let build_ctx = BuildContext {
            group_id: &group.id,
            controller_id: &ctx.config.controller_id,
            vpc_id: &ctx.config.vpc_id,
        };
        build_stack(
            &build_ctx,
            &configs,
            &ResolvedLbConfig {
                scheme: merged.scheme,
                subnet_ids,
                security_group_ids,
                tags: merged.tags,
                wafacl_id: merged.wafacl_id,
                inbound_cidrs: merged.inbound_cidrs,
            },
        )?
    };

    if let Ok(marshalled) = stack.marshal() {
        debug!(group = %group.id, stack = %marshalled, "built desired stack");
    }

    let topology = assembler::assemble(&ctx.cloud, &ctx.config, &group.id).await?;
    let plan = diff::diff(&stack, &topology)?;
    info!(
        group = %group.id,
        mutations = plan.mutation_count(),
        "computed action plan"
    );

    let target_resolver = ClusterTargetResolver {
        services: ctx.stores.services.clone(),
        endpoints: ctx.stores.endpoints.clone(),
        nodes: ctx.stores.nodes.clone(),
    };
    let deployer = StackDeployer::new(&ctx.cloud, &target_resolver);
    let table = deployer.deploy(&stack, &plan).await?;

    if !group.is_teardown() {
        let dns_name = table.resolve(&load_balancer_dns_reference())?;
        for member in &group.members {
            status::publish_load_balancer_hostname(&ctx.client, &member.ingress, &dns_name)
                .await?;
        }
    }

    // Departing members are released only after the deploy succeeded
    for ingress in &group.inactive_members {
        finalizers::remove_group_finalizer(&ctx.client, ingress, &group.id).await?;
    }

    Ok(())
}

/// Emit per-member events reflecting the reconcile outcome.
async fn publish_outcome_events(ctx: &Context, group: &Group, result: &Result<(), ReconcileError>) {
    let member_refs = group
        .members
        .iter()
        .map(|m| m.ingress.object_ref(&()))
        .chain(group.inactive_members.iter().map(|i| i.object_ref(&())));

    match result {
        Ok(()) => {
            let reason = if group.is_teardown() {
                reasons::TEARDOWN_COMPLETE
            } else {
                reasons::SUCCESSFULLY_RECONCILED
            };
            for reference in member_refs {
                ctx.events
                    .publish(
                        &reference,
                        EventType::Normal,
                        reason,
                        Some(format!("group {}", group.id)),
                    )
                    .await;
            }
        }
        Err(err) => {
            let reason = match err {
                ReconcileError::Validation { .. } => reasons::VALIDATION_FAILED,
                _ => reasons::RECONCILE_FAILED,
            };
            for reference in member_refs {
                ctx.events
                    .publish(&reference, EventType::Warning, reason, Some(err.to_string()))
                    .await;
            }
        }
    }
}

