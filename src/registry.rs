//! Guild registry: id generation plus id and name resolution.
//!
//! The world server keeps one registry and routes every guild command
//! through it. Lookups by name are case-insensitive.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::GuildConfig;
use crate::error::GuildError;
use crate::guild::Guild;
use crate::player::GuildPlayer;
use crate::storage::GuildStore;
use crate::GuildId;

pub struct GuildRegistry {
    cfg: Arc<GuildConfig>,
    next_guild_id: GuildId,
    guilds: HashMap<GuildId, Guild>,
}

impl GuildRegistry {
    pub fn new(cfg: Arc<GuildConfig>) -> Self {
        Self {
            cfg,
            next_guild_id: 1,
            guilds: HashMap::new(),
        }
    }

    pub fn generate_guild_id(&mut self) -> GuildId {
        let id = self.next_guild_id;
        self.next_guild_id += 1;
        id
    }

    pub fn guild(&self, guild_id: GuildId) -> Option<&Guild> {
        self.guilds.get(&guild_id)
    }

    pub fn guild_mut(&mut self, guild_id: GuildId) -> Option<&mut Guild> {
        self.guilds.get_mut(&guild_id)
    }

    pub fn guild_by_name(&self, name: &str) -> Option<&Guild> {
        self.guilds
            .values()
            .find(|g| g.name().eq_ignore_ascii_case(name))
    }

    pub fn guild_count(&self) -> usize {
        self.guilds.len()
    }

    /// Create a new guild led by `leader` and register it.
    pub fn create_guild(
        &mut self,
        store: &mut dyn GuildStore,
        name: &str,
        leader: &mut dyn GuildPlayer,
    ) -> Result<GuildId, GuildError> {
        if self.guild_by_name(name).is_some() {
            return Err(GuildError::Conflict("guild name is taken"));
        }
        let id = self.generate_guild_id();
        let guild = Guild::create(self.cfg.clone(), store, id, name, leader)?;
        self.guilds.insert(id, guild);
        Ok(id)
    }

    /// Rename a guild, keeping names unique across the registry.
    pub fn rename_guild(
        &mut self,
        store: &mut dyn GuildStore,
        guild_id: GuildId,
        name: &str,
    ) -> Result<(), GuildError> {
        if self
            .guild_by_name(name)
            .is_some_and(|other| other.id() != guild_id)
        {
            return Err(GuildError::Conflict("guild name is taken"));
        }
        let Some(guild) = self.guilds.get_mut(&guild_id) else {
            return Err(GuildError::NotFound("guild"));
        };
        guild.set_name(store, name)
    }

    /// Disband a guild and drop it from the registry.
    pub fn disband_guild(
        &mut self,
        store: &mut dyn GuildStore,
        guild_id: GuildId,
    ) -> Result<(), GuildError> {
        let Some(mut guild) = self.guilds.remove(&guild_id) else {
            return Err(GuildError::NotFound("guild"));
        };
        guild.disband(store)
    }

    /// Hydrate one guild from the store. Guilds that fail validation are
    /// dropped and not registered.
    pub fn load_guild(
        &mut self,
        store: &mut dyn GuildStore,
        guild_id: GuildId,
    ) -> Result<bool, GuildError> {
        match Guild::load(self.cfg.clone(), store, guild_id)? {
            Some(guild) => {
                if guild_id >= self.next_guild_id {
                    self.next_guild_id = guild_id + 1;
                }
                self.guilds.insert(guild_id, guild);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Forget a guild without touching the store. Used when a disband was
    /// handled through the guild itself.
    pub fn remove_guild(&mut self, guild_id: GuildId) {
        self.guilds.remove(&guild_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::BasicPlayer;
    use crate::storage::MemoryStore;

    fn registry() -> (GuildRegistry, MemoryStore) {
        (
            GuildRegistry::new(Arc::new(GuildConfig::default())),
            MemoryStore::new(),
        )
    }

    #[test]
    fn test_create_assigns_sequential_ids() {
        let (mut reg, mut store) = registry();
        let mut a = BasicPlayer::new(1, "Anduin");
        let mut b = BasicPlayer::new(2, "Bolvar");
        let id_a = reg.create_guild(&mut store, "First", &mut a).unwrap();
        let id_b = reg.create_guild(&mut store, "Second", &mut b).unwrap();
        assert_eq!(id_a, 1);
        assert_eq!(id_b, 2);
        assert_eq!(reg.guild_count(), 2);
    }

    #[test]
    fn test_name_lookup_is_case_insensitive() {
        let (mut reg, mut store) = registry();
        let mut leader = BasicPlayer::new(1, "Anduin");
        reg.create_guild(&mut store, "Silver Hand", &mut leader).unwrap();
        assert!(reg.guild_by_name("silver hand").is_some());
        assert!(reg.guild_by_name("SILVER HAND").is_some());
        assert!(reg.guild_by_name("Golden Hand").is_none());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let (mut reg, mut store) = registry();
        let mut a = BasicPlayer::new(1, "Anduin");
        let mut b = BasicPlayer::new(2, "Bolvar");
        reg.create_guild(&mut store, "Silver Hand", &mut a).unwrap();
        let result = reg.create_guild(&mut store, "silver hand", &mut b);
        assert!(matches!(result, Err(GuildError::Conflict(_))));
    }

    #[test]
    fn test_rename_guild_enforces_unique_names() {
        let (mut reg, mut store) = registry();
        let mut a = BasicPlayer::new(1, "Anduin");
        let mut b = BasicPlayer::new(2, "Bolvar");
        reg.create_guild(&mut store, "Silver Hand", &mut a).unwrap();
        let id = reg
            .create_guild(&mut store, "Scarlet Crusade", &mut b)
            .unwrap();
        let result = reg.rename_guild(&mut store, id, "SILVER HAND");
        assert!(matches!(result, Err(GuildError::Conflict(_))));
        reg.rename_guild(&mut store, id, "Argent Dawn").unwrap();
        assert!(reg.guild_by_name("Argent Dawn").is_some());
        assert_eq!(store.load_guild(id).unwrap().unwrap().name, "Argent Dawn");
    }

    #[test]
    fn test_disband_removes_from_registry_and_store() {
        let (mut reg, mut store) = registry();
        let mut leader = BasicPlayer::new(1, "Anduin");
        let id = reg.create_guild(&mut store, "Doomed", &mut leader).unwrap();
        reg.disband_guild(&mut store, id).unwrap();
        assert!(reg.guild(id).is_none());
        assert!(store.load_guild(id).unwrap().is_none());
    }

    #[test]
    fn test_load_advances_id_generator() {
        let (mut reg, mut store) = registry();
        store.put_character(crate::storage::CharacterRecord {
            guid: 1,
            name: "Anduin".into(),
            level: 60,
            class: 1,
            gender: 0,
            zone_id: 0,
            account_id: 1,
            logout_time: 0,
        });
        {
            let mut other = GuildRegistry::new(Arc::new(GuildConfig::default()));
            other.next_guild_id = 7;
            let mut leader = BasicPlayer::new(1, "Anduin");
            other.create_guild(&mut store, "Seventh", &mut leader).unwrap();
        }
        assert!(reg.load_guild(&mut store, 7).unwrap());
        assert_eq!(reg.generate_guild_id(), 8);
    }
}
