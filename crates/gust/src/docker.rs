use bollard::{Docker, container::InspectContainerOptions, models::ContainerStateStatusEnum};
use gust_core::AbstractProbe;

/// Liveness probe backed by the local Docker daemon: the companion workload
/// counts as live while its container inspects as running, paused or
/// restarting.
pub struct ContainerProbe {
	docker:    Docker,
	container: String,
}

impl ContainerProbe {
	pub fn connect(container: String) -> eyre::Result<Self> {
		let docker = Docker::connect_with_local_defaults()?;
		Ok(Self { docker, container })
	}
}

impl AbstractProbe for ContainerProbe {
	async fn is_live(&self) -> bool {
		let inspect = match self
			.docker
			.inspect_container(&self.container, None::<InspectContainerOptions>)
			.await
		{
			Ok(inspect) => inspect,
			// A failed inspect covers both "no such container" and an
			// unreachable daemon; either way the workload is not usable.
			Err(_) => return false,
		};
		// Status is one of created, running, paused, restarting, removing,
		// exited or dead.
		matches!(
			inspect.state.and_then(|state| state.status),
			Some(
				ContainerStateStatusEnum::RUNNING
					| ContainerStateStatusEnum::PAUSED
					| ContainerStateStatusEnum::RESTARTING
			)
		)
	}
}
