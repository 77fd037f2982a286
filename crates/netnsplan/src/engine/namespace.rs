//! Phase 2: wiring up one namespace.

use super::device::link_exists;
use super::{ApplyResult, Change, Reconciler};
use crate::command::CommandExecutor;
use crate::config::NamespaceConfig;
use crate::error::Result;
use crate::scope::NamespaceScope;

impl<C: CommandExecutor> Reconciler<'_, C> {
    /// Provision every device of `netns`, then run its post-script.
    ///
    /// `created` tells whether phase 1 created the namespace in this apply.
    pub(crate) async fn provision_namespace(
        &self,
        netns: &str,
        config: &NamespaceConfig,
        created: bool,
        result: &mut ApplyResult,
    ) -> Result<()> {
        tracing::debug!(netns = %netns, created, "provision netns");

        self.setup_loopback(netns, config, result).await?;
        self.setup_ethernets(netns, config, result).await?;
        self.setup_dummy_devices(netns, config, result).await?;
        self.setup_veth_devices(netns, config, result).await?;

        match config.script() {
            Some(script) if created || self.options.always_run_post_script => {
                self.run_post_script(netns, script, result).await
            }
            Some(_) => {
                tracing::info!(netns = %netns, "netns already existed, skip post-script");
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Bring up `lo` and add any declared loopback addresses and routes.
    pub(crate) async fn setup_loopback(
        &self,
        netns: &str,
        config: &NamespaceConfig,
        result: &mut ApplyResult,
    ) -> Result<()> {
        let scope = NamespaceScope::named(netns);
        let lo = &config.loopback;
        self.reconcile_device(&scope, "lo", &lo.addresses, &lo.routes, result)
            .await
    }

    /// Move each declared ethernet into `netns` and configure it.
    pub(crate) async fn setup_ethernets(
        &self,
        netns: &str,
        config: &NamespaceConfig,
        result: &mut ApplyResult,
    ) -> Result<()> {
        let scope = NamespaceScope::named(netns);

        for (name, device) in &config.ethernets {
            if link_exists(self.commands, &scope, name).await? {
                tracing::debug!(name = %name, netns = %netns, "device is already exists in netns");
            } else {
                self.perform(
                    Change::MoveLink {
                        scope: NamespaceScope::Default,
                        name: name.clone(),
                        target: netns.to_string(),
                    },
                    result,
                )
                .await?;
            }

            self.reconcile_device(&scope, name, &device.addresses, &device.routes, result)
                .await?;
        }

        Ok(())
    }

    /// Create each declared dummy device inside `netns` and configure it.
    pub(crate) async fn setup_dummy_devices(
        &self,
        netns: &str,
        config: &NamespaceConfig,
        result: &mut ApplyResult,
    ) -> Result<()> {
        let scope = NamespaceScope::named(netns);

        for (name, device) in &config.dummy_devices {
            if link_exists(self.commands, &scope, name).await? {
                tracing::debug!(name = %name, netns = %netns, "device is already exists in netns");
            } else {
                self.perform(
                    Change::CreateDummyLink {
                        scope: scope.clone(),
                        name: name.clone(),
                    },
                    result,
                )
                .await?;
            }

            self.reconcile_device(&scope, name, &device.addresses, &device.routes, result)
                .await?;
        }

        Ok(())
    }

    /// Set up each declared veth pair of `netns`.
    pub(crate) async fn setup_veth_devices(
        &self,
        netns: &str,
        config: &NamespaceConfig,
        result: &mut ApplyResult,
    ) -> Result<()> {
        for (name, veth) in &config.veth_devices {
            self.setup_veth_device(netns, name, veth, result).await?;
        }
        Ok(())
    }

    /// Run `script` with `/bin/sh` inside `netns`.
    pub(crate) async fn run_post_script(
        &self,
        netns: &str,
        script: &str,
        result: &mut ApplyResult,
    ) -> Result<()> {
        self.perform(
            Change::RunPostScript {
                netns: netns.to_string(),
                script: script.to_string(),
            },
            result,
        )
        .await
    }
}
