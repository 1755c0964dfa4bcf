//! 档案引导状态机
//!
//! 登录后读取调用者档案，决定进入受保护页面还是档案填写流程。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use telemed_core::{Result, TelemedError};

/// 引导状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BootstrapState {
    Unauthenticated,
    /// 已登录，档案读取中
    Resolving,
    /// 服务端确认没有档案
    AuthenticatedNoProfile,
    /// 档案读取失败，等待重试
    ProfileUnavailable,
    AuthenticatedWithProfile,
}

/// 引导事件
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BootstrapEvent {
    LoggedIn,
    ProfileMissing,
    ProfileFound,
    ProfileFetchFailed,
    ProfileSaved,
    Retry,
    LoggedOut,
}

/// 档案引导状态机
#[derive(Debug)]
pub struct ProfileStateMachine {
    transitions: HashMap<(BootstrapState, BootstrapEvent), BootstrapState>,
}

impl ProfileStateMachine {
    pub fn new() -> Self {
        use BootstrapEvent as E;
        use BootstrapState as S;

        let mut transitions = HashMap::new();

        transitions.insert((S::Unauthenticated, E::LoggedIn), S::Resolving);
        transitions.insert((S::Resolving, E::ProfileMissing), S::AuthenticatedNoProfile);
        transitions.insert((S::Resolving, E::ProfileFound), S::AuthenticatedWithProfile);
        transitions.insert((S::Resolving, E::ProfileFetchFailed), S::ProfileUnavailable);

        // 保存成功后须重新读取确认
        transitions.insert((S::AuthenticatedNoProfile, E::ProfileSaved), S::Resolving);

        transitions.insert((S::ProfileUnavailable, E::Retry), S::Resolving);
        transitions.insert((S::AuthenticatedNoProfile, E::Retry), S::Resolving);
        transitions.insert((S::AuthenticatedWithProfile, E::Retry), S::Resolving);

        for state in Self::get_all_states() {
            transitions.insert((state, E::LoggedOut), S::Unauthenticated);
        }

        Self { transitions }
    }

    pub fn can_transition(&self, from: &BootstrapState, event: &BootstrapEvent) -> bool {
        self.transitions.contains_key(&(*from, *event))
    }

    pub fn transition(&self, from: &BootstrapState, event: &BootstrapEvent) -> Result<BootstrapState> {
        match self.transitions.get(&(*from, *event)) {
            Some(to) => Ok(*to),
            None => Err(TelemedError::InvalidStateTransition {
                from: format!("{:?}", from),
                event: format!("{:?}", event),
            }),
        }
    }

    pub fn get_all_states() -> Vec<BootstrapState> {
        vec![
            BootstrapState::Unauthenticated,
            BootstrapState::Resolving,
            BootstrapState::AuthenticatedNoProfile,
            BootstrapState::ProfileUnavailable,
            BootstrapState::AuthenticatedWithProfile,
        ]
    }

    pub fn get_possible_events(&self, current_state: &BootstrapState) -> Vec<BootstrapEvent> {
        self.transitions
            .keys()
            .filter(|(state, _)| state == current_state)
            .map(|(_, event)| *event)
            .collect()
    }
}

impl Default for ProfileStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        let sm = ProfileStateMachine::new();

        assert!(sm.can_transition(&BootstrapState::Unauthenticated, &BootstrapEvent::LoggedIn));
        assert!(sm.can_transition(&BootstrapState::Resolving, &BootstrapEvent::ProfileMissing));
        assert!(sm.can_transition(&BootstrapState::ProfileUnavailable, &BootstrapEvent::Retry));
    }

    #[test]
    fn test_invalid_transitions() {
        let sm = ProfileStateMachine::new();

        // 读取失败不能直接当作"无档案"
        assert!(!sm.can_transition(&BootstrapState::ProfileUnavailable, &BootstrapEvent::ProfileSaved));
        assert!(!sm.can_transition(&BootstrapState::Unauthenticated, &BootstrapEvent::ProfileFound));
        assert!(!sm.can_transition(&BootstrapState::AuthenticatedWithProfile, &BootstrapEvent::ProfileSaved));
    }

    #[test]
    fn test_logout_from_every_state() {
        let sm = ProfileStateMachine::new();
        for state in ProfileStateMachine::get_all_states() {
            assert_eq!(
                sm.transition(&state, &BootstrapEvent::LoggedOut).unwrap(),
                BootstrapState::Unauthenticated
            );
        }
    }

    #[test]
    fn test_state_execution() {
        let sm = ProfileStateMachine::new();

        let mut state = BootstrapState::Unauthenticated;
        for event in [
            BootstrapEvent::LoggedIn,
            BootstrapEvent::ProfileMissing,
            BootstrapEvent::ProfileSaved,
            BootstrapEvent::ProfileFound,
        ] {
            state = sm.transition(&state, &event).unwrap();
        }
        assert_eq!(state, BootstrapState::AuthenticatedWithProfile);

        let err = sm
            .transition(&BootstrapState::Resolving, &BootstrapEvent::LoggedIn)
            .unwrap_err();
        assert!(matches!(err, TelemedError::InvalidStateTransition { .. }));
    }

    #[test]
    fn test_possible_events() {
        let sm = ProfileStateMachine::new();
        let mut events = sm.get_possible_events(&BootstrapState::ProfileUnavailable);
        events.sort_by_key(|e| format!("{:?}", e));
        assert_eq!(events, vec![BootstrapEvent::LoggedOut, BootstrapEvent::Retry]);
    }
}
